// # Notification Transport Trait
//
// Defines the single-shot call that tells the remote service about the
// current IP. Retry policy lives in `NotificationClient`, which wraps a
// transport; a transport performs exactly one request per call.

use async_trait::async_trait;
use thiserror::Error;

/// A response that reached us from the notification endpoint
///
/// Any status counts, error codes included; interpreting it is the
/// classifier's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl RawResponse {
    /// Create a raw response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Transport-level failure: no response was received
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection could not be established
    #[error("no internet connection")]
    Unreachable,
    /// The request timed out
    #[error("request timed out")]
    TimedOut,
    /// Any other I/O or protocol failure
    #[error("unexpected transport error: {0}")]
    Other(String),
}

/// Trait for notification transports
///
/// # Trust Level: Untrusted
///
/// ## Forbidden Capabilities
/// - ❌ Retry or sleep (owned by `NotificationClient`)
/// - ❌ Interpret the response body (owned by the classifier)
/// - ❌ Log the credential
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Send the credential once
    async fn send(&self, credential: &str) -> Result<RawResponse, TransportError>;

    /// Endpoint name for logs
    fn endpoint_name(&self) -> &str;
}
