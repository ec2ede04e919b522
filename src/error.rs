//! Error types for jobwatch
//!
//! This module provides the error taxonomy used throughout the library:
//! - Missing-input errors (`Undefined`) for absent jobs, identifiers or pages
//! - Cancellation and deadline errors (`Cancelled`, `Timeout`, `Condition`)
//! - Job outcome classification (`Invalid` for business failures,
//!   `Unexpected` for system errors and anomalous terminal states)
//! - Per-message decoding problems (`Marshalling`, `Empty`) which are
//!   recovered locally by the message drain loop rather than propagated
//! - Normalized remote call failures (`Api`)

use thiserror::Error;

/// Result type alias for jobwatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for jobwatch
///
/// Fatal errors near the boundary are narratable as
/// "could not \<fetch what\> for \<job\>: \<cause\>"; the contextual strings
/// carried by each variant are built with that shape in mind.
#[derive(Debug, Error)]
pub enum Error {
    /// A required input was missing (job, identifier, page, ...)
    #[error("undefined: {0}")]
    Undefined(String),

    /// The governing cancellation scope was cancelled
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// A deadline elapsed before the operation finished
    #[error("timed out: {0}")]
    Timeout(String),

    /// A state-wait predicate never became true within its retry budget
    #[error("condition never met: {0}")]
    Condition(String),

    /// The job reported a business failure
    #[error("invalid: {0}")]
    Invalid(String),

    /// The job reported a system error, or reached a terminal state
    /// without any classifiable outcome
    #[error("unexpected: {0}")]
    Unexpected(String),

    /// A stream item could not be interpreted as a known message shape
    #[error("marshalling error: {0}")]
    Marshalling(String),

    /// An item was present but carried no content
    #[error("empty: {0}")]
    Empty(String),

    /// A remote call failed (transport error or non-2xx response),
    /// normalized by the call-succeeded gate
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl Error {
    /// Returns true for cancellation- or deadline-flavored errors
    ///
    /// Used by callers that must distinguish "the scope was torn down"
    /// from genuine operation failures.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled(_) | Error::Timeout(_))
    }
}

/// Failure of a remote API call
///
/// Produced exclusively by [`check_api_call`](crate::api::check_api_call),
/// which folds a transport error or a non-2xx response into this one shape.
/// `status_code` is `0` when no response was received at all.
#[derive(Debug, Error)]
#[error("{context} ({status_code}): {details}")]
pub struct ApiError {
    /// Description of what led to the error, e.g.
    /// "could not fetch build job [xyz]'s status"
    pub context: String,
    /// HTTP status code of the response, or 0 when none was received
    pub status_code: u16,
    /// Server-provided error description or transport error text
    pub details: String,
}
