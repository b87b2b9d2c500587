//! Configuration types for the seedbox keeper
//!
//! The daemon fills [`SeedboxConfig`] from environment variables; library
//! users can build it directly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default location of the durable state record
pub const DEFAULT_STATE_PATH: &str = "/data/mamapi.json";

/// Default public IP-echo endpoint
pub const DEFAULT_IP_ENDPOINT: &str = "https://api.ipify.org";

/// Default dynamic seedbox notification endpoint
pub const DEFAULT_NOTIFY_ENDPOINT: &str = "https://t.myanonamouse.net/json/dynamicSeedbox.php";

/// Default per-request HTTP timeout
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Session credential (`mam_id`)
///
/// The Debug and Display implementations never expose the full value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wrap a credential value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for the cookie header and the state record only
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the credential is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First few characters followed by an ellipsis, safe for logs
    pub fn masked(&self) -> String {
        let prefix: String = self.0.chars().take(4).collect();
        format!("{}…", prefix)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&"<REDACTED>").finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// Main seedbox keeper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedboxConfig {
    /// Session credential sent as the `mam_id` cookie
    pub credential: Credential,

    /// Detailed (debug) logging instead of summary logging
    #[serde(default)]
    pub debug: bool,

    /// Path of the durable state record
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// URL returning the caller's public IP as plain text
    #[serde(default = "default_ip_endpoint")]
    pub ip_endpoint: String,

    /// URL of the dynamic seedbox notification API
    #[serde(default = "default_notify_endpoint")]
    pub notify_endpoint: String,

    /// Per-request HTTP timeout (in seconds)
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl SeedboxConfig {
    /// Create a configuration with defaults for everything but the credential
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            debug: false,
            state_path: default_state_path(),
            ip_endpoint: default_ip_endpoint(),
            notify_endpoint: default_notify_endpoint(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }

    /// Validate the configuration
    ///
    /// A missing credential is reported as [`FatalReason::MissingCredential`](crate::FatalReason::MissingCredential)
    /// so the daemon can tell it apart from the other settings.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.credential.is_empty() {
            return Err(crate::FatalReason::MissingCredential.into());
        }

        // Would split or terminate the Cookie header
        if self
            .credential
            .expose()
            .chars()
            .any(|c| c == ';' || c == ',' || c.is_whitespace() || c.is_control())
        {
            return Err(crate::Error::config(
                "credential contains whitespace, ';' or ',' and cannot be sent as a cookie",
            ));
        }

        if self.state_path.as_os_str().is_empty() {
            return Err(crate::Error::config("state path cannot be empty"));
        }

        validate_endpoint("IP endpoint", &self.ip_endpoint)?;
        validate_endpoint("notification endpoint", &self.notify_endpoint)?;

        if !(1..=300).contains(&self.http_timeout_secs) {
            return Err(crate::Error::config(format!(
                "HTTP timeout must be between 1 and 300 seconds. Got: {}",
                self.http_timeout_secs
            )));
        }

        Ok(())
    }

    /// Whether any endpoint uses plain HTTP
    pub fn uses_plain_http(&self) -> bool {
        self.ip_endpoint.starts_with("http://") || self.notify_endpoint.starts_with("http://")
    }
}

fn validate_endpoint(name: &str, url: &str) -> Result<(), crate::Error> {
    if url.is_empty() {
        return Err(crate::Error::config(format!("{} cannot be empty", name)));
    }
    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(crate::Error::config(format!(
            "{} must use HTTP or HTTPS scheme. Got: {}",
            name, url
        )));
    }
    Ok(())
}

fn default_state_path() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_PATH)
}

fn default_ip_endpoint() -> String {
    DEFAULT_IP_ENDPOINT.to_string()
}

fn default_notify_endpoint() -> String {
    DEFAULT_NOTIFY_ENDPOINT.to_string()
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FatalReason;

    #[test]
    fn credential_is_redacted() {
        let credential = Credential::new("abcdef123456");
        assert_eq!(format!("{:?}", credential), "Credential(\"<REDACTED>\")");
        assert_eq!(credential.to_string(), "abcd…");
        assert_eq!(credential.expose(), "abcdef123456");
    }

    #[test]
    fn defaults_validate() {
        let config = SeedboxConfig::new(Credential::new("abc123"));
        assert!(config.validate().is_ok());
        assert!(!config.uses_plain_http());
        assert_eq!(config.state_path, PathBuf::from(DEFAULT_STATE_PATH));
    }

    #[test]
    fn missing_credential_is_fatal() {
        let config = SeedboxConfig::new(Credential::new(""));
        let err = config.validate().unwrap_err();
        assert_eq!(err.fatal_reason(), Some(&FatalReason::MissingCredential));
    }

    #[test]
    fn rejects_cookie_breaking_credential() {
        let config = SeedboxConfig::new(Credential::new("abc; other=1"));
        let err = config.validate().unwrap_err();
        assert!(err.fatal_reason().is_none());
    }

    #[test]
    fn rejects_bad_endpoint_and_timeout() {
        let mut config = SeedboxConfig::new(Credential::new("abc"));
        config.ip_endpoint = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = SeedboxConfig::new(Credential::new("abc"));
        config.http_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: SeedboxConfig =
            serde_json::from_str(r#"{"credential":"abc","debug":true}"#).unwrap();
        assert!(config.debug);
        assert_eq!(config.credential.expose(), "abc");
        assert_eq!(config.notify_endpoint, DEFAULT_NOTIFY_ENDPOINT);
        assert_eq!(config.http_timeout_secs, DEFAULT_HTTP_TIMEOUT_SECS);
    }
}
