// # seedbox-core
//
// Core library for keeping a dynamic seedbox session pinned to the caller's
// current public IP.
//
// ## Architecture Overview
//
// - **IpProvider**: Trait for discovering the current public IP
// - **NotificationTransport**: Trait for one delivery of the credential
// - **NotificationClient**: Transport retries (3 attempts, then a 30 minute pause)
// - **StateStore**: Trait for the durable session record
// - **rate_limit**: Pure one-hour window arithmetic
// - **classifier**: Closed mapping from remote answers to mutations and waits
// - **Controller**: The sequential poll → compare → rate-limit → notify loop
//
// ## Design Principles
//
// 1. **Single session**: One credential, one record, one thread of control
// 2. **Persist before acting**: Every state change is saved before a wait or exit
// 3. **Typed outcomes**: Components return enums; only fatal conditions are errors
// 4. **Library-first**: The daemon is a thin shell around `Controller`

pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod notify;
pub mod rate_limit;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use classifier::{ApiMessage, Verdict};
pub use config::{Credential, SeedboxConfig};
pub use engine::{Controller, Cycle};
pub use error::{Error, FatalReason, Result};
pub use notify::{Delivery, NotificationClient, RetryPolicy};
pub use state::{FileStateStore, MemoryStateStore};
pub use traits::{IpProvider, NotificationTransport, SessionState, StateStore};
