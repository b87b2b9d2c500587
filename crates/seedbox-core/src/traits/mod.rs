//! Core traits for the seedbox keeper
//!
//! - [`IpProvider`]: Discover the current public IP
//! - [`NotificationTransport`]: Deliver the credential to the remote API once
//! - [`StateStore`]: Durable session record
//! - [`Clock`]: Wall-clock time for the rate-limit window

pub mod clock;
pub mod ip_provider;
pub mod notification;
pub mod state_store;

pub use clock::{Clock, SystemClock};
pub use ip_provider::{IpLookup, IpProvider, Unavailable};
pub use notification::{NotificationTransport, RawResponse, TransportError};
pub use state_store::{SessionState, StateStore};
