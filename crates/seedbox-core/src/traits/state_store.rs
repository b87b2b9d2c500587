// # State Store Trait
//
// Defines the persisted session record and the interface for storing it.
//
// ## Purpose
//
// The session record makes repeated notifications idempotent and survives
// restarts. It tracks:
// - The last IP the remote service confirmed
// - When the last accepted update happened (rate-limit window)
// - Which credential those facts belong to
// - Whether that credential has been rejected for good
//
// The four fields are read and written as one unit. A store never persists
// half a record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

/// The persisted session record
///
/// Field names are the on-disk schema. Any record with a different field set
/// fails to deserialize and is replaced by [`SessionState::template`].
#[derive(Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionState {
    /// Last IP the remote accepted; empty means never
    pub last_updated_ip: String,
    /// Time of the last accepted update; `None` means unknown
    #[serde(with = "epoch_seconds")]
    pub last_successful_update: Option<DateTime<Utc>>,
    /// Credential the other fields belong to
    pub last_credential: String,
    /// Sticky: the remote rejected `last_credential`
    pub credential_invalid: bool,
}

impl SessionState {
    /// The zero-value record
    pub fn template() -> Self {
        Self::default()
    }

    /// Apply the credential-rotation rule
    ///
    /// When `active` differs from the stored credential, every field is reset
    /// to the template and `last_credential` is set to `active`. Otherwise the
    /// record is returned untouched, sticky flag included.
    pub fn reconcile_credential(self, active: &str) -> Self {
        if self.last_credential == active {
            return self;
        }
        Self {
            last_credential: active.to_string(),
            ..Self::template()
        }
    }

    /// Whether `active` is the credential the remote already rejected
    pub fn rejects(&self, active: &str) -> bool {
        self.credential_invalid && self.last_credential == active
    }
}

// Keeps the credential out of logs
impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let credential = if self.last_credential.is_empty() {
            "<empty>"
        } else {
            "<REDACTED>"
        };
        f.debug_struct("SessionState")
            .field("last_updated_ip", &self.last_updated_ip)
            .field("last_successful_update", &self.last_successful_update)
            .field("last_credential", &credential)
            .field("credential_invalid", &self.credential_invalid)
            .finish()
    }
}

/// Timestamps as numeric epoch seconds, `0` meaning unknown
///
/// Older records stored fractional seconds; those still load.
mod epoch_seconds {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(value.map(|t| t.timestamp()).unwrap_or(0))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || secs <= 0.0 {
            return Ok(None);
        }
        Ok(DateTime::from_timestamp(secs.floor() as i64, 0))
    }
}

/// Trait for state store implementations
///
/// # Trust Level: Trusted (Core Component)
///
/// Stores perform I/O only. They never decide what the record should
/// contain; the controller owns every mutation.
///
/// ## Implementation Guidelines
///
/// - **Whole-record writes**: `save()` replaces the entire record atomically
/// - **Synchronous durability**: `save()` returns only after the record is durable
/// - **Forgiving reads**: missing or malformed records load as the template
/// - **Permission failures are fatal**: report them as
///   [`FatalReason::StatePermission`](crate::FatalReason::StatePermission)
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the record
    ///
    /// # Returns
    ///
    /// - `Ok(SessionState)`: The stored record, or the template when the
    ///   record is missing or does not match the schema
    /// - `Err(Error)`: The record exists but cannot be read
    async fn load(&self) -> Result<SessionState, crate::Error>;

    /// Persist the whole record
    async fn save(&self, state: &SessionState) -> Result<(), crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(credential: &str) -> SessionState {
        SessionState {
            last_updated_ip: "1.2.3.4".to_string(),
            last_successful_update: DateTime::from_timestamp(1_700_000_000, 0),
            last_credential: credential.to_string(),
            credential_invalid: true,
        }
    }

    #[test]
    fn rotation_resets_everything_but_credential() {
        let reconciled = stored("A").reconcile_credential("B");
        assert_eq!(
            reconciled,
            SessionState {
                last_credential: "B".to_string(),
                ..SessionState::template()
            }
        );
    }

    #[test]
    fn same_credential_keeps_record() {
        let state = stored("A");
        assert_eq!(state.clone().reconcile_credential("A"), state);
        assert!(state.rejects("A"));
        assert!(!state.rejects("B"));
    }

    #[test]
    fn timestamps_round_trip_as_epoch_seconds() {
        let state = stored("A");
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["last_successful_update"], 1_700_000_000);

        let template = serde_json::to_value(SessionState::template()).unwrap();
        assert_eq!(template["last_successful_update"], 0);

        let back: SessionState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn legacy_fractional_timestamp_loads() {
        let json = r#"{
            "last_updated_ip": "5.6.7.8",
            "last_successful_update": 1700000000.75,
            "last_credential": "A",
            "credential_invalid": false
        }"#;
        let state: SessionState = serde_json::from_str(json).unwrap();
        assert_eq!(
            state.last_successful_update,
            DateTime::from_timestamp(1_700_000_000, 0)
        );
    }

    #[test]
    fn schema_mismatch_fails_to_deserialize() {
        let missing = r#"{"last_updated_ip": "", "last_successful_update": 0, "last_credential": ""}"#;
        assert!(serde_json::from_str::<SessionState>(missing).is_err());

        let extra = r#"{
            "last_updated_ip": "",
            "last_successful_update": 0,
            "last_credential": "",
            "credential_invalid": false,
            "unexpected": 1
        }"#;
        assert!(serde_json::from_str::<SessionState>(extra).is_err());
    }

    #[test]
    fn debug_hides_credential() {
        let rendered = format!("{:?}", stored("secret-cookie"));
        assert!(!rendered.contains("secret-cookie"));
        assert!(rendered.contains("<REDACTED>"));
    }
}
