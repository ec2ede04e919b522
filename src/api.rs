//! Call-succeeded gate for remote API responses
//!
//! Every collaborator call goes through [`check_api_call`] before its result
//! is inspected: a transport error, a non-2xx status, or a cancelled scope
//! are all normalized into one typed [`Error`] here. The rest of the library
//! never reads raw status codes.

use crate::error::{ApiError, Error, Result};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// Snapshot of a transport response
///
/// Carries only what the gate needs: the status code and the raw body (used
/// to extract a server-side error description on failure). The body of a
/// successful response has already been deserialized by the collaborator
/// into the call's typed result.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code of the response
    pub status: u16,
    /// Raw response body, when captured
    pub body: Option<String>,
}

impl ApiResponse {
    /// Create a response snapshot from a status code alone
    pub fn new(status: u16) -> Self {
        Self { status, body: None }
    }

    /// Create a response snapshot with a body
    pub fn with_body(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: Some(body.into()),
        }
    }

    /// Consume a [`reqwest::Response`] into a snapshot
    ///
    /// Reads the body to completion; a body that cannot be read is treated
    /// as absent rather than as a new failure.
    pub async fn from_reqwest(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.ok();
        Self { status, body }
    }
}

/// Outcome of a raw collaborator call, before normalization
///
/// Mirrors the (result, transport-response, error) triplet of the remote
/// collaborators: either a typed result together with the response snapshot,
/// or a transport-level error raised before any response was available.
pub type ApiOutcome<T> = std::result::Result<(T, ApiResponse), TransportError>;

/// Error raised by the transport before a response was available
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// HTTP client failure (connect, timeout, decode, ...)
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Transport failure reported as a plain message
    #[error("{0}")]
    Other(String),
}

/// Whether an API response is successful (2xx)
pub fn is_call_successful(response: &ApiResponse) -> bool {
    (200..300).contains(&response.status)
}

/// Verify a collaborator call outcome, normalizing failures
///
/// `context` describes what led to the error if there is one, e.g.
/// "could not fetch build job \[xyz\]'s status". A cancelled scope wins over
/// whatever the transport reported, so a torn-down watch never surfaces a
/// misleading transport error.
pub fn check_api_call<T>(
    cancel: &CancellationToken,
    context: &str,
    outcome: ApiOutcome<T>,
) -> Result<T> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled(context.to_string()));
    }
    match outcome {
        Err(transport) => Err(Error::Api(ApiError {
            context: context.to_string(),
            status_code: 0,
            details: transport.to_string(),
        })),
        Ok((value, response)) => {
            if is_call_successful(&response) {
                Ok(value)
            } else {
                Err(Error::Api(ApiError {
                    context: context.to_string(),
                    status_code: response.status,
                    details: fetch_api_error_description(&response).unwrap_or_default(),
                }))
            }
        }
    }
}

/// Structured error body returned by the remote service
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    #[serde(default)]
    http_status_code: Option<u16>,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    fields: Vec<ErrorField>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorField {
    #[serde(default)]
    field_name: Option<String>,
    #[serde(default)]
    field_path: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Extract a human-readable error description from a failed response body
///
/// A body following the service's structured error shape is rendered into a
/// single line; any other body is used raw. Returns `None` when no body was
/// captured.
pub fn fetch_api_error_description(response: &ApiResponse) -> Option<String> {
    let body = response.body.as_deref()?;
    if body.is_empty() {
        return None;
    }
    let parsed: ErrorResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(_) => return Some(body.to_string()),
    };
    let mut description = String::from("API call error");
    if let Some(code) = parsed.http_status_code {
        description.push_str(&format!(" ({code})"));
    }
    if let Some(request_id) = &parsed.request_id {
        description.push_str(&format!(" [request-id: {request_id}]"));
    }
    if let Some(message) = &parsed.message {
        description.push_str(&format!(" {message}"));
    }
    if !parsed.fields.is_empty() {
        description.push_str(" [");
        for (i, field) in parsed.fields.iter().enumerate() {
            if i > 0 {
                description.push(',');
            }
            description.push_str(&format!(
                "{}: {} ({})",
                field.field_name.as_deref().unwrap_or(""),
                field.message.as_deref().unwrap_or(""),
                field.field_path.as_deref().unwrap_or("")
            ));
        }
        description.push(']');
    }
    Some(description)
}
