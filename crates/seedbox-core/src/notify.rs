//! Notification delivery with transport-level retry
//!
//! [`NotificationClient`] owns the retry policy; the wrapped
//! [`NotificationTransport`] makes exactly one request per call.
//!
//! ```text
//! ┌── cycle ───────────────────────────────────────┐
//! │ attempt 1 ─30s─ attempt 2 ─30s─ attempt 3      │──30min──┐
//! └────────────────────────────────────────────────┘         │
//!        ▲                                                   │
//!        └───────────────────────────────────────────────────┘
//! ```
//!
//! The loop ends only when the remote answers. Any status counts as an
//! answer except 500, which the remote uses for a malformed credential.

use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::Credential;
use crate::traits::{NotificationTransport, RawResponse};

/// Retry schedule for transport failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per cycle
    pub attempts: usize,
    /// Pause between attempts inside a cycle
    pub attempt_delay: Duration,
    /// Pause after a cycle in which every attempt failed
    pub cycle_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            attempt_delay: Duration::from_secs(30),
            cycle_delay: Duration::from_secs(30 * 60),
        }
    }
}

/// Result of a delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The remote answered; the classifier decides what it means
    Received(RawResponse),
    /// The remote answered HTTP 500: the credential is malformed
    MalformedCredential,
}

/// Delivers the credential, retrying transport failures indefinitely
pub struct NotificationClient {
    transport: Box<dyn NotificationTransport>,
    policy: RetryPolicy,
}

impl NotificationClient {
    /// Create a client with the default policy (3 × 30 s, then 30 min)
    pub fn new(transport: Box<dyn NotificationTransport>) -> Self {
        Self::with_policy(transport, RetryPolicy::default())
    }

    /// Create a client with a custom policy
    pub fn with_policy(transport: Box<dyn NotificationTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// The active policy
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Send the credential until the remote answers
    pub async fn notify(&self, credential: &Credential) -> Delivery {
        let attempts = self.policy.attempts.max(1);

        loop {
            for attempt in 1..=attempts {
                info!("Sending cookie to {}...", self.transport.endpoint_name());

                match self.transport.send(credential.expose()).await {
                    Ok(response) => {
                        debug!("Received HTTP status code: '{}'", response.status);
                        if response.status == 500 {
                            error!("Received HTTP status code '500'");
                            error!("This is usually due to an incorrectly formatted mam_id");
                            return Delivery::MalformedCredential;
                        }
                        return Delivery::Received(response);
                    }
                    Err(e) => {
                        error!("{}. Attempt #: {}", e, attempt);
                    }
                }

                if attempt < attempts {
                    tokio::time::sleep(self.policy.attempt_delay).await;
                }
            }

            error!(
                "Multiple HTTP GET failures: sleeping for {} minutes",
                self.policy.cycle_delay.as_secs() / 60
            );
            tokio::time::sleep(self.policy.cycle_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::TransportError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
        seen: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<RawResponse, TransportError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl NotificationTransport for std::sync::Arc<Scripted> {
        async fn send(&self, credential: &str) -> Result<RawResponse, TransportError> {
            self.seen.lock().unwrap().push(credential.to_string());
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

    fn fast() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            attempt_delay: Duration::from_millis(1),
            cycle_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn default_policy_matches_remote_expectations() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.attempt_delay, Duration::from_secs(30));
        assert_eq!(policy.cycle_delay, Duration::from_secs(1800));
    }

    #[tokio::test]
    async fn first_answer_is_returned() {
        let transport = std::sync::Arc::new(Scripted::new(vec![Ok(RawResponse::new(
            200,
            r#"{"msg":"Completed"}"#,
        ))]));
        let client = NotificationClient::with_policy(Box::new(transport.clone()), fast());

        let delivery = client.notify(&Credential::new("cookie")).await;
        assert_eq!(
            delivery,
            Delivery::Received(RawResponse::new(200, r#"{"msg":"Completed"}"#))
        );
        assert_eq!(*transport.seen.lock().unwrap(), vec!["cookie".to_string()]);
    }

    #[tokio::test]
    async fn error_statuses_count_as_answers() {
        let transport = std::sync::Arc::new(Scripted::new(vec![Ok(RawResponse::new(404, ""))]));
        let client = NotificationClient::with_policy(Box::new(transport.clone()), fast());

        assert_eq!(
            client.notify(&Credential::new("cookie")).await,
            Delivery::Received(RawResponse::new(404, ""))
        );
    }

    #[tokio::test]
    async fn status_500_stops_immediately() {
        let transport = std::sync::Arc::new(Scripted::new(vec![
            Ok(RawResponse::new(500, "")),
            Ok(RawResponse::new(200, r#"{"msg":"Completed"}"#)),
        ]));
        let client = NotificationClient::with_policy(Box::new(transport.clone()), fast());

        assert_eq!(
            client.notify(&Credential::new("cookie")).await,
            Delivery::MalformedCredential
        );
        assert_eq!(transport.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_cycle_is_followed_by_another() {
        let transport = std::sync::Arc::new(Scripted::new(vec![
            Err(TransportError::Unreachable),
            Err(TransportError::TimedOut),
            Err(TransportError::Other("reset".to_string())),
            Err(TransportError::Unreachable),
            Ok(RawResponse::new(200, r#"{"msg":"No change"}"#)),
        ]));
        let client = NotificationClient::with_policy(Box::new(transport.clone()), fast());

        let delivery = client.notify(&Credential::new("cookie")).await;
        assert!(matches!(delivery, Delivery::Received(ref r) if r.status == 200));
        assert_eq!(transport.seen.lock().unwrap().len(), 5);
    }
}
