//! Core seedbox controller
//!
//! The Controller is responsible for:
//! - Loading the session record and reconciling it with the active credential
//! - Polling the public IP
//! - Skipping notifications the remote would ignore or reject
//! - Delivering the credential and classifying the answer
//! - Persisting every state change before waiting or exiting
//!
//! ## Cycle
//!
//! ```text
//! ┌────────────┐  Unavailable   ┌──────────────────────┐
//! │ IpProvider │──────────────▶ │ wait 300 s / 600 s   │
//! └────────────┘                └──────────────────────┘
//!       │ ip
//!       ▼
//!  ip == last_updated_ip ─────▶ wait 300 s
//!       │ no
//!       ▼
//!  rate_limit::assess ──────── Limited ───▶ wait remaining + 2 s
//!       │            └──────── ClockSkew ─▶ forget timestamp, save, wait 1 h
//!       │ Open
//!       ▼
//! ┌────────────────────┐   ┌────────────┐   ┌───────────┐
//! │ NotificationClient │──▶│ classifier │──▶│ save      │──▶ wait / fatal
//! └────────────────────┘   └────────────┘   └───────────┘
//! ```
//!
//! ## Threading
//!
//! One controller owns one [`SessionState`]. Every step runs to completion
//! before the next begins; nothing is spawned.

use std::convert::Infallible;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::classifier::{self, Verdict};
use crate::config::Credential;
use crate::error::{Error, FatalReason, Result};
use crate::notify::{Delivery, NotificationClient};
use crate::rate_limit::{self, WINDOW_SLACK, Window};
use crate::traits::ip_provider::FAILURE_RETRY;
use crate::traits::{Clock, IpLookup, IpProvider, SessionState, StateStore, SystemClock};

/// Wait between checks while the IP is unchanged
pub const IDLE_WAIT: Duration = Duration::from_secs(300);

/// Wait after the clock was found to have moved backward
pub const CLOCK_SKEW_WAIT: Duration = Duration::from_secs(3600);

/// Result of a single cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cycle {
    /// The IP lookup failed
    IpUnavailable {
        /// Wait before the next cycle
        wait: Duration,
    },
    /// The IP matches the last accepted update
    Unchanged {
        /// Wait before the next cycle
        wait: Duration,
    },
    /// The IP changed inside the rate-limit window
    RateLimited {
        /// Wait before the next cycle
        wait: Duration,
    },
    /// The stored update time lies in the future and was reset
    ClockSkew {
        /// Wait before the next cycle
        wait: Duration,
    },
    /// The remote was notified and answered
    Notified {
        /// Classified answer
        message: classifier::ApiMessage,
        /// Wait before the next cycle
        wait: Duration,
    },
}

impl Cycle {
    /// How long to sleep before the next cycle
    pub fn wait(&self) -> Duration {
        match self {
            Self::IpUnavailable { wait }
            | Self::Unchanged { wait }
            | Self::RateLimited { wait }
            | Self::ClockSkew { wait }
            | Self::Notified { wait, .. } => *wait,
        }
    }
}

/// The poll / rate-limit / notify state machine
///
/// ## Lifecycle
///
/// 1. Create with [`Controller::start()`] (loads and reconciles state)
/// 2. Run with [`Controller::run()`], which returns only on a fatal error
pub struct Controller {
    /// Public IP lookup
    ip_provider: Box<dyn IpProvider>,

    /// Credential delivery with transport retries
    notifier: NotificationClient,

    /// Durable session record
    state_store: Box<dyn StateStore>,

    /// Wall clock for the rate-limit window
    clock: Box<dyn Clock>,

    /// Active credential
    credential: Credential,

    /// In-memory copy of the session record, always equal to what was last saved
    state: SessionState,

    /// Log the first unchanged-IP observation at info, later ones at debug
    reported_idle: bool,
}

impl Controller {
    /// Load state, apply the credential rules, and build a controller
    ///
    /// No network request happens here. A credential change resets and
    /// saves the record before returning.
    ///
    /// # Errors
    ///
    /// - [`FatalReason::CredentialInvalidated`]: the stored record marks the
    ///   active credential as rejected
    /// - Whatever the store reports for unreadable or unwritable state
    pub async fn start(
        ip_provider: Box<dyn IpProvider>,
        notifier: NotificationClient,
        state_store: Box<dyn StateStore>,
        credential: Credential,
    ) -> Result<Self> {
        Self::start_with_clock(
            ip_provider,
            notifier,
            state_store,
            credential,
            Box::new(SystemClock),
        )
        .await
    }

    /// Same as [`Controller::start()`] with an explicit clock
    pub async fn start_with_clock(
        ip_provider: Box<dyn IpProvider>,
        notifier: NotificationClient,
        state_store: Box<dyn StateStore>,
        credential: Credential,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        if credential.is_empty() {
            error!("No credential supplied");
            return Err(FatalReason::MissingCredential.into());
        }

        let loaded = state_store.load().await?;
        let state = loaded.clone().reconcile_credential(credential.expose());

        if state != loaded {
            info!(
                "Credential changed to {}, resetting stored session state",
                credential
            );
            state_store.save(&state).await?;
        }

        if state.rejects(credential.expose()) {
            error!(
                "Credential {} was previously rejected as an invalid session",
                credential
            );
            error!("Supply a new credential; this one will not be retried");
            return Err(FatalReason::CredentialInvalidated.into());
        }

        debug!("Starting with state: {:?}", state);

        Ok(Self {
            ip_provider,
            notifier,
            state_store,
            clock,
            credential,
            state,
            reported_idle: false,
        })
    }

    /// Current session record
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Run cycles until a fatal condition occurs
    ///
    /// Never returns `Ok`.
    pub async fn run(&mut self) -> Result<Infallible> {
        loop {
            let cycle = self.step().await?;
            debug!("Cycle finished: {:?}", cycle);
            tokio::time::sleep(cycle.wait()).await;
        }
    }

    /// Run one cycle without the trailing wait
    pub async fn step(&mut self) -> Result<Cycle> {
        debug!("Attempting to grab external IP...");
        let current_ip = match self.ip_provider.fetch_public_ip().await {
            IpLookup::Found(ip) => ip,
            IpLookup::Unavailable(reason) => {
                let wait = reason.retry_after();
                debug!(
                    "IP lookup unavailable ({}), retrying in {} minutes",
                    reason,
                    wait.as_secs() / 60
                );
                return Ok(Cycle::IpUnavailable { wait });
            }
        };

        if current_ip.parse::<IpAddr>().is_err() {
            warn!(
                "IP service returned '{}', which is not an IP address; retrying in {} minutes",
                current_ip,
                FAILURE_RETRY.as_secs() / 60
            );
            return Ok(Cycle::IpUnavailable {
                wait: FAILURE_RETRY,
            });
        }

        if current_ip == self.state.last_updated_ip {
            if self.reported_idle {
                debug!("Current IP identical to last update sent, sleeping for 5 minutes");
            } else {
                info!(
                    "Current IP ({}) matches the last accepted update; checking every 5 minutes",
                    current_ip
                );
                self.reported_idle = true;
            }
            return Ok(Cycle::Unchanged { wait: IDLE_WAIT });
        }

        let now = self.clock.now();
        match rate_limit::assess(self.state.last_successful_update, now) {
            Window::Limited { remaining } => {
                info!(
                    "Current IP ({}) is different than previous update ({}), but we are currently rate limited.",
                    current_ip, self.state.last_updated_ip
                );
                info!(
                    "Last successful IP update was at {}. Sleeping for {} minutes until an hour has passed",
                    self.last_update_display(),
                    remaining.as_secs() / 60
                );
                Ok(Cycle::RateLimited {
                    wait: remaining + WINDOW_SLACK,
                })
            }
            Window::ClockSkew => {
                error!(
                    "Last successful update ({}) lies in the future; the system clock may have moved backward",
                    self.last_update_display()
                );
                error!("Resetting update timestamp and sleeping for an hour");
                self.state.last_successful_update = None;
                self.persist().await?;
                Ok(Cycle::ClockSkew {
                    wait: CLOCK_SKEW_WAIT,
                })
            }
            Window::Open => self.notify(current_ip).await,
        }
    }

    /// Deliver the credential and act on the answer
    async fn notify(&mut self, current_ip: String) -> Result<Cycle> {
        info!(
            "Detected IP change. Old IP: '{}' New IP: '{}'",
            self.state.last_updated_ip, current_ip
        );

        let response = match self.notifier.notify(&self.credential).await {
            Delivery::Received(response) => response,
            Delivery::MalformedCredential => {
                error!("Used credential {} for this request", self.credential);
                return Err(FatalReason::MalformedCredential.into());
            }
        };

        let message = classifier::classify(&response);
        let before = self.state.clone();
        let verdict = message.apply(&mut self.state, &current_ip, self.clock.now());

        if self.state != before {
            self.persist().await?;
        }

        match verdict {
            Verdict::Wait(wait) => Ok(Cycle::Notified { message, wait }),
            Verdict::Fatal(reason) => {
                if reason == FatalReason::NoSessionCookie {
                    error!("Used credential {} for this request", self.credential);
                }
                Err(Error::Fatal(reason))
            }
        }
    }

    async fn persist(&self) -> Result<()> {
        self.state_store.save(&self.state).await?;
        debug!("Saved state: {:?}", self.state);
        Ok(())
    }

    fn last_update_display(&self) -> String {
        self.state
            .last_successful_update
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}
