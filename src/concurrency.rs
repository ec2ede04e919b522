//! Cancellation-aware waiting primitives
//!
//! Every suspension point in the library re-checks its governing
//! [`CancellationToken`] before and after sleeping, and a cancelled token
//! unblocks a sleeping task promptly instead of waiting out the full
//! duration.

use crate::error::{Error, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Fail fast when the governing scope has been cancelled
pub(crate) fn check_cancelled(cancel: &CancellationToken, what: &str) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled(what.to_string()))
    } else {
        Ok(())
    }
}

/// Sleep for `duration`, waking early if the scope is cancelled
pub(crate) async fn sleep_with_cancel(
    cancel: &CancellationToken,
    duration: Duration,
    what: &str,
) -> Result<()> {
    check_cancelled(cancel, what)?;
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled(what.to_string())),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
