//! # jobwatch
//!
//! Client-side library for watching remote asynchronous jobs: polling their
//! status to completion while relaying their message feed to a log sink.
//!
//! ## Design Philosophy
//!
//! jobwatch is designed to be:
//! - **Client-agnostic** - The remote service is reached through the
//!   [`JobClient`] trait; any generated or hand-written client plugs in
//! - **Sensible defaults** - A zero-configuration watcher works out of the box
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Cancellation-aware** - Every operation runs under a
//!   [`CancellationToken`](tokio_util::sync::CancellationToken) scope and
//!   stops promptly when it is cancelled
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use jobwatch::{
//!     AsynchronousJob, FormatterOptions, JobClient, JobManager, MessageLoggerFactory,
//!     TracingSink, WatcherConfig,
//! };
//!
//! async fn watch(
//!     client: Arc<dyn JobClient>,
//!     job: Arc<dyn AsynchronousJob>,
//! ) -> jobwatch::Result<()> {
//!     let config = WatcherConfig::default();
//!     let logger_factory = MessageLoggerFactory::new(
//!         Arc::new(TracingSink::new()),
//!         FormatterOptions::default(),
//!         config.logger_options(),
//!     );
//!     let manager = JobManager::new(client, logger_factory, &config);
//!
//!     let cancel = CancellationToken::new();
//!     manager
//!         .wait_for_job_completion_with_timeout(&cancel, job, Duration::from_secs(300))
//!         .await
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Call-succeeded gate for remote API responses
pub mod api;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Job manager: status classification and completion watching
pub mod manager;
/// Message formatting and logging
pub mod messages;
/// Pagination: dual paging interfaces, adapters, and the stream paginator
pub mod pagination;
/// State-wait retry logic with exponential backoff
pub mod retry;
/// Core contracts: jobs, messages, and the remote collaborator
pub mod types;

mod concurrency;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use api::{ApiOutcome, ApiResponse, TransportError, check_api_call, is_call_successful};
pub use config::WatcherConfig;
pub use error::{ApiError, Error, Result};
pub use manager::JobManager;
pub use messages::{
    FormatterOptions, LoggerOptions, MessageFormatter, MessageLogger, MessageLoggerFactory,
    MessageSink, TracingSink,
};
pub use pagination::{
    ClientMessageStream, ClientPage, PaginatorFactory, StaticPage, StaticPageStream,
    StreamPaginator,
};
pub use retry::BackoffPolicy;
pub use types::{AsynchronousJob, JobClient, JobMessage, StreamMessage};
