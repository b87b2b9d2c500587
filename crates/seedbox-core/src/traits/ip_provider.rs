// # IP Provider Trait
//
// Defines the interface for discovering the caller's current public IP.
//
// ## Implementations
//
// - HTTP IP-echo services: `seedbox-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use seedbox_core::traits::{IpLookup, IpProvider};
//
// match provider.fetch_public_ip().await {
//     IpLookup::Found(ip) => println!("public IP: {}", ip),
//     IpLookup::Unavailable(reason) => println!("try again later: {}", reason),
// }
// ```

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Retry delay after the network was unreachable
pub const UNREACHABLE_RETRY: Duration = Duration::from_secs(300);

/// Retry delay after any other lookup failure
pub const FAILURE_RETRY: Duration = Duration::from_secs(600);

/// Outcome of one public IP lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpLookup {
    /// Response body, trimmed; not validated as an address
    Found(String),
    /// No usable answer this time
    Unavailable(Unavailable),
}

/// Why a lookup produced no IP
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unavailable {
    /// Could not connect at all (no route, DNS failure, refused)
    Unreachable,
    /// The request timed out
    TimedOut,
    /// The service answered with a non-success status
    Status(u16),
    /// Any other transport failure
    Transport(String),
}

impl Unavailable {
    /// How long to wait before the next lookup
    pub fn retry_after(&self) -> Duration {
        match self {
            Self::Unreachable => UNREACHABLE_RETRY,
            Self::TimedOut | Self::Status(_) | Self::Transport(_) => FAILURE_RETRY,
        }
    }
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable => write!(f, "network unreachable"),
            Self::TimedOut => write!(f, "request timed out"),
            Self::Status(code) => write!(f, "HTTP status {}", code),
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

/// Trait for public IP providers
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Issue one outbound request per call
/// - ✅ Keep transient bookkeeping that only changes log severity
///
/// ## Forbidden Capabilities
/// - ❌ Sleep or retry (the controller owns back-off)
/// - ❌ Access the state store
/// - ❌ Return errors: every failure is an [`Unavailable`] outcome
#[async_trait]
pub trait IpProvider: Send + Sync {
    /// Fetch the caller's current public IP
    async fn fetch_public_ip(&self) -> IpLookup;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_retries_sooner_than_other_failures() {
        assert_eq!(Unavailable::Unreachable.retry_after(), Duration::from_secs(300));
        assert_eq!(Unavailable::TimedOut.retry_after(), Duration::from_secs(600));
        assert_eq!(Unavailable::Status(503).retry_after(), Duration::from_secs(600));
        assert_eq!(
            Unavailable::Transport("reset".to_string()).retry_after(),
            Duration::from_secs(600)
        );
    }
}
