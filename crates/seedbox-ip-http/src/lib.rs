// # HTTP IP Provider
//
// This crate provides the public IP lookup for the seedbox keeper.
//
// ## Purpose
//
// The remote service sees the caller's public address, which is not
// visible from local interfaces behind NAT. An IP-echo service
// (api.ipify.org by default) returns it as plain text.
//
// ## Behavior
//
// - One GET per call; the controller owns back-off
// - Every failure is an `Unavailable` outcome, never an error
// - The first failure after a success is logged at error level; repeats
//   are logged at debug until the connection is restored

use seedbox_core::config::DEFAULT_IP_ENDPOINT;
use seedbox_core::traits::{IpLookup, IpProvider, Unavailable};

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP IP-echo provider
pub struct HttpIpProvider {
    /// URL returning the caller's IP as plain text
    url: String,

    /// HTTP client
    client: reqwest::Client,

    /// Whether the previous lookup failed; only changes log severity
    internet_out: AtomicBool,
}

impl HttpIpProvider {
    /// Create a provider for `url` with the default timeout
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    /// Create a provider with a custom request timeout
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            internet_out: AtomicBool::new(false),
        }
    }

    /// URL being queried
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Classify a reqwest failure
    fn classify(err: &reqwest::Error) -> Unavailable {
        if err.is_timeout() {
            Unavailable::TimedOut
        } else if err.is_connect() {
            Unavailable::Unreachable
        } else {
            Unavailable::Transport(err.to_string())
        }
    }

    fn unavailable(&self, reason: Unavailable) -> IpLookup {
        let was_out = self.internet_out.swap(true, Ordering::Relaxed);
        match (&reason, was_out) {
            (_, true) => tracing::debug!("Failed to grab external IP again: {}", reason),
            (Unavailable::Unreachable, false) => {
                tracing::error!("Failed to grab external IP - no internet");
                tracing::error!(
                    "Checking for internet every {} minutes",
                    reason.retry_after().as_secs() / 60
                );
            }
            (_, false) => {
                tracing::error!("External IP check failed: {}", reason);
                tracing::error!(
                    "Sleeping for {} minutes",
                    reason.retry_after().as_secs() / 60
                );
            }
        }
        IpLookup::Unavailable(reason)
    }
}

impl Default for HttpIpProvider {
    fn default() -> Self {
        Self::new(DEFAULT_IP_ENDPOINT)
    }
}

#[async_trait::async_trait]
impl IpProvider for HttpIpProvider {
    async fn fetch_public_ip(&self) -> IpLookup {
        let response = match self.client.get(&self.url).send().await {
            Ok(response) => response,
            Err(e) => return self.unavailable(Self::classify(&e)),
        };

        if !response.status().is_success() {
            return self.unavailable(Unavailable::Status(response.status().as_u16()));
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return self.unavailable(Self::classify(&e)),
        };
        let ip = text.trim().to_string();

        if self.internet_out.swap(false, Ordering::Relaxed) {
            tracing::info!("Connection restored");
            tracing::info!("Fetched external IP: {}", ip);
        } else {
            tracing::debug!("Fetched external IP: {}", ip);
        }

        IpLookup::Found(ip)
    }
}
