//! Error types for the seedbox keeper
//!
//! Everything that can stop the process is a [`FatalReason`]. The rest of
//! [`Error`] covers local failures (storage, configuration) that the daemon
//! also treats as terminal, but which carry an ordinary message.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for seedbox operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the seedbox keeper
#[derive(Error, Debug)]
pub enum Error {
    /// A terminal condition: the process must exit non-zero
    #[error("fatal: {0}")]
    Fatal(#[from] FatalReason),

    /// State store errors (other than permission failures, which are fatal)
    #[error("State store error: {0}")]
    StateStore(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The fatal reason, if this error is one
    pub fn fatal_reason(&self) -> Option<&FatalReason> {
        match self {
            Self::Fatal(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Every condition under which the keeper refuses to continue
///
/// Retrying with the same credential cannot fix any of these; an operator
/// has to intervene.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FatalReason {
    /// No credential was supplied
    #[error("no credential supplied")]
    MissingCredential,

    /// The stored record marks the active credential as rejected
    #[error("credential was previously rejected by the remote service; supply a new one")]
    CredentialInvalidated,

    /// The state file exists but cannot be read or written
    #[error("permission denied on state file {}", path.display())]
    StatePermission {
        /// Path of the state file
        path: PathBuf,
    },

    /// The notification endpoint answered HTTP 500
    #[error("remote returned HTTP 500, usually a malformed credential")]
    MalformedCredential,

    /// The session is not locked, or not allowed the dynamic seedbox setting
    #[error("remote reported incorrect session type")]
    IncorrectSessionType,

    /// The remote deemed the session invalid
    #[error("remote reported invalid session")]
    InvalidSession,

    /// The credential cookie did not reach the remote
    #[error("remote reported no session cookie")]
    NoSessionCookie,
}

impl FatalReason {
    /// Whether the remote service, rather than the local host, caused this
    pub fn is_remote_rejection(&self) -> bool {
        matches!(
            self,
            Self::CredentialInvalidated
                | Self::MalformedCredential
                | Self::IncorrectSessionType
                | Self::InvalidSession
                | Self::NoSessionCookie
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_converts_into_error() {
        let err: Error = FatalReason::InvalidSession.into();
        assert_eq!(err.fatal_reason(), Some(&FatalReason::InvalidSession));
        assert!(Error::config("x").fatal_reason().is_none());
    }

    #[test]
    fn local_failures_are_not_remote_rejections() {
        assert!(!FatalReason::MissingCredential.is_remote_rejection());
        let permission = FatalReason::StatePermission {
            path: PathBuf::from("/data/mamapi.json"),
        };
        assert!(!permission.is_remote_rejection());
        assert!(permission.to_string().contains("/data/mamapi.json"));
        assert!(FatalReason::NoSessionCookie.is_remote_rejection());
    }
}
