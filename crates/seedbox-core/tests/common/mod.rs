//! Test doubles and common utilities for contract tests
//!
//! Every double writes into a shared [`Journal`] so tests can check the
//! order of saves and network calls, not just their counts.

#![allow(dead_code)]

use chrono::{DateTime, TimeDelta, Utc};
use seedbox_core::error::Result;
use seedbox_core::traits::{
    Clock, IpLookup, IpProvider, NotificationTransport, RawResponse, SessionState, StateStore,
    TransportError,
};
use seedbox_core::{Controller, Credential, NotificationClient, RetryPolicy};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Credential used by most tests
pub const CREDENTIAL: &str = "test-cookie-0001";

/// Something observable a double did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The IP provider was asked for the public IP
    Fetched,
    /// The transport sent the credential
    Sent(String),
    /// The store persisted a record
    Saved(SessionState),
}

/// Ordered record of double activity
#[derive(Debug, Clone, Default)]
pub struct Journal {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Journal {
    pub fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Sent(_)))
            .count()
    }

    pub fn fetch_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Fetched))
            .count()
    }

    pub fn saves(&self) -> Vec<SessionState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Saved(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

/// An IpProvider that replays a script, then reports the network unreachable
pub struct ScriptedIpProvider {
    lookups: Mutex<VecDeque<IpLookup>>,
    journal: Journal,
}

impl ScriptedIpProvider {
    pub fn new(lookups: Vec<IpLookup>, journal: &Journal) -> Self {
        Self {
            lookups: Mutex::new(lookups.into()),
            journal: journal.clone(),
        }
    }

    /// Always answers with `ip`
    pub fn fixed(ip: &str, cycles: usize, journal: &Journal) -> Self {
        Self::new(vec![IpLookup::Found(ip.to_string()); cycles], journal)
    }
}

#[async_trait::async_trait]
impl IpProvider for ScriptedIpProvider {
    async fn fetch_public_ip(&self) -> IpLookup {
        self.journal.push(Event::Fetched);
        self.lookups
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(IpLookup::Unavailable(
                seedbox_core::traits::Unavailable::Unreachable,
            ))
    }
}

/// A NotificationTransport that replays a script of replies
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<std::result::Result<RawResponse, TransportError>>>,
    journal: Journal,
}

impl ScriptedTransport {
    pub fn new(
        replies: Vec<std::result::Result<RawResponse, TransportError>>,
        journal: &Journal,
    ) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            journal: journal.clone(),
        }
    }

    /// Replies with one JSON `msg` per call
    pub fn messages(msgs: &[&str], journal: &Journal) -> Self {
        Self::new(
            msgs.iter()
                .map(|msg| Ok(json_reply(msg)))
                .collect(),
            journal,
        )
    }
}

#[async_trait::async_trait]
impl NotificationTransport for ScriptedTransport {
    async fn send(&self, credential: &str) -> std::result::Result<RawResponse, TransportError> {
        self.journal.push(Event::Sent(credential.to_string()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(TransportError::Unreachable))
    }

    fn endpoint_name(&self) -> &str {
        "scripted"
    }
}

/// A StateStore that keeps one record in memory and journals every save
#[derive(Clone)]
pub struct RecordingStateStore {
    state: Arc<Mutex<Option<SessionState>>>,
    journal: Journal,
}

impl RecordingStateStore {
    pub fn new(initial: Option<SessionState>, journal: &Journal) -> Self {
        Self {
            state: Arc::new(Mutex::new(initial)),
            journal: journal.clone(),
        }
    }

    /// The record as currently persisted
    pub fn persisted(&self) -> Option<SessionState> {
        self.state.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl StateStore for RecordingStateStore {
    async fn load(&self) -> Result<SessionState> {
        Ok(self.state.lock().unwrap().clone().unwrap_or_default())
    }

    async fn save(&self, state: &SessionState) -> Result<()> {
        *self.state.lock().unwrap() = Some(state.clone());
        self.journal.push(Event::Saved(state.clone()));
        Ok(())
    }
}

/// A clock pinned to one instant
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// The instant every test runs at
pub fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_736_424_000, 0).unwrap()
}

/// `now()` minus `secs` seconds
pub fn ago(secs: i64) -> DateTime<Utc> {
    now() - TimeDelta::seconds(secs)
}

/// A 200 response carrying `{"msg": msg}`
pub fn json_reply(msg: &str) -> RawResponse {
    RawResponse::new(200, serde_json::json!({ "msg": msg }).to_string())
}

/// A stored record for `CREDENTIAL`
pub fn stored(ip: &str, last_success: Option<DateTime<Utc>>) -> SessionState {
    SessionState {
        last_updated_ip: ip.to_string(),
        last_successful_update: last_success,
        last_credential: CREDENTIAL.to_string(),
        credential_invalid: false,
    }
}

/// Retry policy short enough for tests
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        attempt_delay: Duration::from_millis(1),
        cycle_delay: Duration::from_millis(5),
    }
}

/// Start a controller over the given doubles
pub async fn start(
    ip_provider: ScriptedIpProvider,
    transport: ScriptedTransport,
    store: &RecordingStateStore,
    credential: &str,
) -> Result<Controller> {
    Controller::start_with_clock(
        Box::new(ip_provider),
        NotificationClient::with_policy(Box::new(transport), fast_policy()),
        Box::new(store.clone()),
        Credential::new(credential),
        Box::new(FixedClock(now())),
    )
    .await
}
