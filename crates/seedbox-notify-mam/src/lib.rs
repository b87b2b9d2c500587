// # MyAnonamouse Notification Transport
//
// This crate delivers the session credential to the dynamic seedbox API.
//
// ## Architectural Constraints
//
// ### Trust Level: Untrusted (Notification Transport)
//
// **Allowed Capabilities**:
// - ✅ One GET to the configured endpoint per call
// - ✅ Return the status and body of whatever answer arrives
//
// **Forbidden Capabilities**:
// - ❌ Retry or sleep (owned by NotificationClient in seedbox-core)
// - ❌ Interpret the body (owned by the classifier)
// - ❌ Touch the state store
//
// ## Security Requirements
//
// - The credential NEVER appears in logs or Debug output
// - The credential travels only in the `mam_id` cookie
//
// ## API Reference
//
// ```http
// GET /json/dynamicSeedbox.php
// Cookie: mam_id=<credential>
// ```
//
// Answers are JSON like `{"Success": true, "msg": "Completed", "ip": "1.2.3.4"}`.

use async_trait::async_trait;
use reqwest::header::COOKIE;
use seedbox_core::config::DEFAULT_NOTIFY_ENDPOINT;
use seedbox_core::traits::{NotificationTransport, RawResponse, TransportError};
use std::time::Duration;

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Name of the session cookie
const SESSION_COOKIE: &str = "mam_id";

/// Dynamic seedbox transport
///
/// Holds no credential; it is passed per call so the controller stays the
/// only owner.
#[derive(Debug, Clone)]
pub struct MamTransport {
    /// Notification endpoint
    endpoint: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

impl MamTransport {
    /// Create a transport for `endpoint` with the default timeout
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_timeout(endpoint, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a transport with a custom request timeout
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Endpoint being called
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Classify a reqwest failure
    fn classify(err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::TimedOut
        } else if err.is_connect() {
            TransportError::Unreachable
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

impl Default for MamTransport {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFY_ENDPOINT)
    }
}

#[async_trait]
impl NotificationTransport for MamTransport {
    async fn send(&self, credential: &str) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .get(&self.endpoint)
            .header(COOKIE, format!("{}={}", SESSION_COOKIE, credential))
            .send()
            .await
            .map_err(Self::classify)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(Self::classify)?;

        tracing::trace!("Dynamic seedbox answered {} with {} bytes", status, body.len());
        Ok(RawResponse { status, body })
    }

    fn endpoint_name(&self) -> &str {
        "MAM"
    }
}
