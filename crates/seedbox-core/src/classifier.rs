//! Interpretation of notification responses
//!
//! The remote answers with a JSON body carrying a `msg` field. Each known
//! message maps to one [`ApiMessage`] variant, and each variant carries a
//! fixed state mutation and either a wait or a fatal exit.
//!
//! | `msg` (any case)         | Mutation                                 | Next      |
//! |--------------------------|------------------------------------------|-----------|
//! | `Completed`              | store IP, last update = now              | 3660 s    |
//! | `No change`              | store IP                                 | 300 s     |
//! | `Last change too recent` | last update = unknown                    | 1800 s    |
//! | `Incorrect session type` | none                                     | fatal     |
//! | `Invalid session`        | mark credential invalid                  | fatal     |
//! | `No Session Cookie`      | none                                     | fatal     |
//! | missing / empty          | none                                     | 300 s     |
//! | anything else            | none                                     | 300 s     |

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::FatalReason;
use crate::traits::{RawResponse, SessionState};

/// Wait after an accepted update; one hour plus a minute of slack
pub const COMPLETED_WAIT: Duration = Duration::from_secs(3660);

/// Wait after the remote reports the IP already matches
pub const NO_CHANGE_WAIT: Duration = Duration::from_secs(300);

/// Wait after the remote reports an unknown-to-us rate-limit window
pub const TOO_RECENT_WAIT: Duration = Duration::from_secs(1800);

/// Wait after a response we could not make sense of
pub const UNRECOGNIZED_WAIT: Duration = Duration::from_secs(300);

/// The closed set of remote answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiMessage {
    /// The session now follows the new IP
    Completed,
    /// The session already had this IP
    NoChange,
    /// The remote's own rate-limit window is still open
    LastChangeTooRecent,
    /// The session is not locked, or not allowed to use the dynamic seedbox
    IncorrectSessionType,
    /// The credential was rejected
    InvalidSession,
    /// The credential cookie was not received
    NoSessionCookie,
    /// JSON without a usable `msg`
    Missing,
    /// A `msg` we do not know
    Unrecognized(String),
    /// The body was not JSON
    NotJson,
}

/// What the controller does next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Sleep this long, then start the next cycle
    Wait(Duration),
    /// Persist, then terminate
    Fatal(FatalReason),
}

/// Map a raw response onto an [`ApiMessage`]
pub fn classify(response: &RawResponse) -> ApiMessage {
    let body: serde_json::Value = match serde_json::from_str(&response.body) {
        Ok(body) => body,
        Err(e) => {
            error!("API response was not in JSON: {}", e);
            error!("HTTP response status code received: '{}'", response.status);
            return ApiMessage::NotJson;
        }
    };

    let msg = match body.get("msg") {
        Some(serde_json::Value::String(msg)) => msg.to_lowercase(),
        None | Some(serde_json::Value::Null) => String::new(),
        Some(other) => return ApiMessage::Unrecognized(other.to_string()),
    };
    info!("Received response: '{}'", msg);

    match msg.as_str() {
        "completed" => ApiMessage::Completed,
        "no change" => ApiMessage::NoChange,
        "last change too recent" => ApiMessage::LastChangeTooRecent,
        "incorrect session type" => ApiMessage::IncorrectSessionType,
        "invalid session" => ApiMessage::InvalidSession,
        "no session cookie" => ApiMessage::NoSessionCookie,
        "" => ApiMessage::Missing,
        _ => ApiMessage::Unrecognized(msg),
    }
}

impl ApiMessage {
    /// Apply this message's mutation to `state` and decide what comes next
    ///
    /// The caller persists `state` before acting on the verdict.
    pub fn apply(&self, state: &mut SessionState, current_ip: &str, now: DateTime<Utc>) -> Verdict {
        match self {
            Self::Completed => {
                info!("Session IP successfully updated to: {}", current_ip);
                info!("Sleeping for 1 hour (earlier requests would be rate limited)");
                state.last_updated_ip = current_ip.to_string();
                state.last_successful_update = Some(now);
                Verdict::Wait(COMPLETED_WAIT)
            }
            Self::NoChange => {
                info!(
                    "Successful exchange, however IP already matches current session as {}",
                    current_ip
                );
                state.last_updated_ip = current_ip.to_string();
                Verdict::Wait(NO_CHANGE_WAIT)
            }
            Self::LastChangeTooRecent => {
                warn!(
                    "Remote rejects due to last change too recent, and last successful update is unknown: retrying in 30 minutes"
                );
                state.last_successful_update = None;
                Verdict::Wait(TOO_RECENT_WAIT)
            }
            Self::IncorrectSessionType => {
                error!(
                    "Per remote: 'The session cookie is not to a locked session, or not a session that is allowed the dynamic seedbox setting'"
                );
                Verdict::Fatal(FatalReason::IncorrectSessionType)
            }
            Self::InvalidSession => {
                error!(
                    "Per remote: 'The system deemed the session invalid (bad mam_id value, or you've moved off the locked IP/ASN.)'"
                );
                error!("ASN locked sessions sometimes produce this error");
                error!("Sometimes sessions are randomly invalidated");
                error!("This credential will not be retried; supply a new one to continue");
                state.credential_invalid = true;
                Verdict::Fatal(FatalReason::InvalidSession)
            }
            Self::NoSessionCookie => {
                error!("Per remote: 'You didn't properly provide the mam_id session cookie.'");
                error!("Your mam_id may be formatted incorrectly");
                Verdict::Fatal(FatalReason::NoSessionCookie)
            }
            Self::Missing => {
                warn!("HTTP response did not include a 'msg'");
                Verdict::Wait(UNRECOGNIZED_WAIT)
            }
            Self::Unrecognized(msg) => {
                error!("Received unknown json response message: {}", msg);
                Verdict::Wait(UNRECOGNIZED_WAIT)
            }
            Self::NotJson => Verdict::Wait(UNRECOGNIZED_WAIT),
        }
    }
}
