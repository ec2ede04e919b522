//! Bounded state-wait with exponential backoff
//!
//! Remote jobs move between states at their own pace; waiting for a state is
//! a retry loop whose budget scales with the caller's deadline rather than
//! being fixed: the number of attempts is the timeout divided by the
//! policy's minimum interval. Delays grow exponentially (with optional
//! jitter to avoid thundering herd) up to a cap.

use crate::concurrency::{check_cancelled, sleep_with_cancel};
use crate::error::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Exponential backoff policy for state-wait retry loops
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Minimum wait interval; also the unit the retry budget is derived from
    /// (default: 100ms)
    #[serde(default = "default_min_interval", with = "duration_ms_serde")]
    pub min_interval: Duration,

    /// Maximum wait interval between attempts (default: 10 seconds)
    #[serde(default = "default_max_interval", with = "duration_ms_serde")]
    pub max_interval: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

fn default_min_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_max_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            min_interval: default_min_interval(),
            max_interval: default_max_interval(),
            multiplier: default_multiplier(),
            jitter: default_true(),
        }
    }
}

impl BackoffPolicy {
    /// Number of attempts afforded by `timeout`
    ///
    /// The budget scales with the deadline: one attempt per minimum wait
    /// interval, with at least one attempt regardless.
    pub fn attempts_within(&self, timeout: Duration) -> u64 {
        let min = self.min_interval.max(Duration::from_millis(1));
        (timeout.as_millis() / min.as_millis()).max(1) as u64
    }

    /// Delay to apply after the given zero-based attempt
    fn delay_for(&self, attempt: u64) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(32) as i32);
        let delay = Duration::from_secs_f64(self.min_interval.as_secs_f64() * factor)
            .min(self.max_interval);
        if self.jitter { add_jitter(delay) } else { delay }
    }
}

/// Add random jitter to a delay, uniformly up to 50% on top of it
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=0.5);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}

/// Retry `predicate` until it reports true, within a deadline-derived budget
///
/// Fails with `Condition` when the budget is exhausted without the predicate
/// becoming true; predicate errors and cancellation propagate immediately.
/// `description` names the awaited condition for error narration.
pub async fn wait_until<F, Fut>(
    cancel: &CancellationToken,
    policy: &BackoffPolicy,
    timeout: Duration,
    description: &str,
    mut predicate: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let attempts = policy.attempts_within(timeout);
    for attempt in 0..attempts {
        check_cancelled(cancel, description)?;
        if predicate().await? {
            if attempt > 0 {
                tracing::debug!(attempts = attempt + 1, "condition met after retry");
            }
            return Ok(());
        }
        if attempt + 1 < attempts {
            sleep_with_cancel(cancel, policy.delay_for(attempt), description).await?;
        }
    }
    Err(Error::Condition(format!(
        "{description} not reached within {timeout:?}"
    )))
}

// serde helper storing durations as integer milliseconds
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
