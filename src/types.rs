//! Core contracts: jobs, messages, and the remote collaborator
//!
//! These traits are the minimal read-only view this library takes of the
//! service's generated data types. Implementations are expected to be thin
//! wrappers around whatever the consumer's OpenAPI client produces.

use crate::api::ApiOutcome;
use crate::error::{Error, Result};
use crate::pagination::{ClientMessageStream, StaticPage, StaticPageStream};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// A remote, long-running unit of work tracked by boolean status flags
///
/// The flags are not mutually exclusive: `is_done` may be true while
/// `is_error` or `is_failure` is also true. Callers must interpret the
/// combination, never a single flag; see
/// [`JobManager::has_job_completed`](crate::manager::JobManager::has_job_completed)
/// for the precedence rules.
pub trait AsynchronousJob: Send + Sync + 'static {
    /// Unique name of the job; fails with `Undefined` when the identity
    /// cannot be resolved
    fn name(&self) -> Result<String>;

    /// Human-readable title, when the service provides one
    fn title(&self) -> Option<String>;

    /// Kind of job, used in error narration (e.g. "build job")
    fn job_type(&self) -> String;

    /// Whether the job has terminated
    fn is_done(&self) -> bool;

    /// Whether a system error occurred
    fn is_error(&self) -> bool;

    /// Whether the job failed
    fn is_failure(&self) -> bool;

    /// Whether the job succeeded
    fn is_success(&self) -> bool;

    /// Whether the job is queued and has not started yet
    fn is_queued(&self) -> bool;

    /// Whether the job has messages available
    fn has_messages(&self) -> bool;

    /// Whether the job has artefacts available
    fn has_artefacts(&self) -> bool;

    /// Free-form state string, for diagnostics only. Never use this for
    /// control decisions; use the flags.
    fn status(&self) -> String;
}

/// A generic service message
pub trait JobMessage: Send + Sync {
    /// Source of the message, when present
    fn source(&self) -> Option<&str>;

    /// Creation time of the message, when present
    fn ctime(&self) -> Option<&DateTime<Utc>>;

    /// Severity label, when present
    fn severity(&self) -> Option<&str>;

    /// Message text, when present
    fn text(&self) -> Option<&str>;
}

/// Standard progress/log message emitted by a job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageObject {
    /// Message text
    #[serde(default)]
    pub message: Option<String>,
    /// Severity label (e.g. "info", "warning", "error")
    #[serde(default)]
    pub severity: Option<String>,
    /// Component that emitted the message
    #[serde(default)]
    pub source: Option<String>,
    /// Creation time
    #[serde(default)]
    pub ctime: Option<DateTime<Utc>>,
}

/// Notification message emitted by a job feed
///
/// Carries only text and a timestamp; notification feeds have no severity
/// or source attribution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationMessageObject {
    /// Message text
    #[serde(default)]
    pub message: Option<String>,
    /// Creation time
    #[serde(default)]
    pub ctime: Option<DateTime<Utc>>,
}

impl JobMessage for MessageObject {
    fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
    fn ctime(&self) -> Option<&DateTime<Utc>> {
        self.ctime.as_ref()
    }
    fn severity(&self) -> Option<&str> {
        self.severity.as_deref()
    }
    fn text(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl JobMessage for NotificationMessageObject {
    fn source(&self) -> Option<&str> {
        None
    }
    fn ctime(&self) -> Option<&DateTime<Utc>> {
        self.ctime.as_ref()
    }
    fn severity(&self) -> Option<&str> {
        None
    }
    fn text(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// One of the known message shapes carried by a job feed
///
/// Stream items are opaque JSON values; this closed union is the complete
/// set of shapes the decode step recognizes. Notification messages are
/// tried first since their shape is the more restrictive of the two.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StreamMessage {
    /// A notification feed entry
    Notification(NotificationMessageObject),
    /// A standard progress/log message
    Message(MessageObject),
}

impl JobMessage for StreamMessage {
    fn source(&self) -> Option<&str> {
        match self {
            StreamMessage::Notification(m) => m.source(),
            StreamMessage::Message(m) => m.source(),
        }
    }
    fn ctime(&self) -> Option<&DateTime<Utc>> {
        match self {
            StreamMessage::Notification(m) => m.ctime(),
            StreamMessage::Message(m) => m.ctime(),
        }
    }
    fn severity(&self) -> Option<&str> {
        match self {
            StreamMessage::Notification(m) => m.severity(),
            StreamMessage::Message(m) => m.severity(),
        }
    }
    fn text(&self) -> Option<&str> {
        match self {
            StreamMessage::Notification(m) => m.text(),
            StreamMessage::Message(m) => m.text(),
        }
    }
}

/// Keys a stream item must carry at least one of to be considered a message
const KNOWN_MESSAGE_KEYS: [&str; 4] = ["message", "severity", "source", "ctime"];

/// Interpret an opaque stream item as a known message shape
///
/// Fails with `Empty` when the item carries no content at all, and with
/// `Marshalling` when it carries content of an unrecognized shape. Both are
/// recovered locally by the drain loop; neither stops the drain.
pub fn decode_stream_item(raw: &Value) -> Result<StreamMessage> {
    if raw.is_null() {
        return Err(Error::Empty("message item carried no content".to_string()));
    }
    let object = raw
        .as_object()
        .ok_or_else(|| Error::Marshalling(format!("message item is not an object: {raw}")))?;
    if object.is_empty() {
        return Err(Error::Empty("message item carried no content".to_string()));
    }
    if !KNOWN_MESSAGE_KEYS.iter().any(|key| object.contains_key(*key)) {
        return Err(Error::Marshalling(format!(
            "message item has no recognized field: {raw}"
        )));
    }
    serde_json::from_value(raw.clone())
        .map_err(|e| Error::Marshalling(format!("message item could not be decoded: {e}")))
}

/// Remote collaborator used to reach the job service
///
/// Each call is an async remote request returning the typed result together
/// with a transport-response snapshot, or a transport error — the triplet
/// the call-succeeded gate in [`crate::api`] normalizes. Transport retry is
/// this collaborator's concern, not the library's.
#[async_trait]
pub trait JobClient: Send + Sync + 'static {
    /// Fetch the current status of a job
    async fn fetch_job_status(&self, job_name: &str) -> ApiOutcome<Arc<dyn AsynchronousJob>>;

    /// Fetch the first page of a job's message feed
    ///
    /// `None` means the feed exists but has no first page yet; the
    /// paginator treats it as an immediately-exhausted stream.
    async fn fetch_first_message_page(
        &self,
        job_name: &str,
    ) -> ApiOutcome<Option<Arc<dyn ClientMessageStream>>>;

    /// Follow the next-page link of the given page
    ///
    /// `None` means the link led nowhere; the paginator treats it as
    /// exhaustion, not as an error.
    async fn fetch_next_message_page(
        &self,
        current: Arc<dyn StaticPage>,
    ) -> Result<Option<Arc<dyn StaticPage>>>;

    /// Fetch a new stream page when the current stream promises a future
    ///
    /// `None` means no future page has appeared yet.
    async fn fetch_future_message_stream(
        &self,
        current: Arc<dyn StaticPageStream>,
    ) -> Result<Option<Arc<dyn StaticPageStream>>>;
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_null_item_is_empty() {
        let err = decode_stream_item(&Value::Null).unwrap_err();
        assert!(matches!(err, Error::Empty(_)));
    }

    #[test]
    fn test_decode_empty_object_is_empty() {
        let err = decode_stream_item(&json!({})).unwrap_err();
        assert!(matches!(err, Error::Empty(_)));
    }

    #[test]
    fn test_decode_unknown_shape_is_marshalling() {
        let err = decode_stream_item(&json!({"foo": 1})).unwrap_err();
        assert!(matches!(err, Error::Marshalling(_)));
        let err = decode_stream_item(&json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, Error::Marshalling(_)));
    }

    #[test]
    fn test_decode_notification_shape() {
        let item = json!({"message": "queued"});
        let decoded = decode_stream_item(&item).unwrap();
        assert!(matches!(decoded, StreamMessage::Notification(_)));
        assert_eq!(decoded.text(), Some("queued"));
        assert_eq!(decoded.severity(), None);
    }

    #[test]
    fn test_decode_full_message_shape() {
        let item = json!({
            "message": "compiling",
            "severity": "info",
            "source": "builder",
            "ctime": "2024-05-01T10:00:00Z"
        });
        let decoded = decode_stream_item(&item).unwrap();
        assert!(matches!(decoded, StreamMessage::Message(_)));
        assert_eq!(decoded.text(), Some("compiling"));
        assert_eq!(decoded.severity(), Some("info"));
        assert_eq!(decoded.source(), Some("builder"));
        assert!(decoded.ctime().is_some());
    }
}
