//! Rate-limit window arithmetic
//!
//! The remote service accepts at most one IP change per hour. These are pure
//! functions of "last accepted update" and "now"; the controller decides
//! what to do with the answer.

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

/// Minimum interval the remote enforces between accepted updates
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Slack added after a rate-limited wait so the next attempt lands past the boundary
pub const WINDOW_SLACK: Duration = Duration::from_secs(2);

/// Where "now" sits relative to the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// A notification may be sent
    Open,
    /// A notification would be rejected; wait at least `remaining`
    Limited {
        /// Whole minutes left in the window
        remaining: Duration,
    },
    /// The last update lies in the future: the clock moved backward
    ClockSkew,
}

/// Whether a notification is currently forbidden
///
/// An unknown last update is never limited. The boundary is inclusive: an
/// update exactly 60 minutes old still limits.
pub fn is_limited(last_success: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_success {
        None => false,
        Some(last) => now - last <= window(),
    }
}

/// Time left until the window closes, rounded up to a whole minute
///
/// Never negative; zero once the window has passed.
pub fn remaining_window(last_success: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
    let Some(last) = last_success else {
        return Duration::ZERO;
    };

    let remaining = window() - (now - last);
    if remaining <= TimeDelta::zero() {
        return Duration::ZERO;
    }

    // remaining is positive here, so the conversion cannot fail
    let remaining = remaining.to_std().unwrap_or(Duration::ZERO);
    let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    Duration::from_secs(secs.div_ceil(60) * 60)
}

/// Classify `now` against the window
pub fn assess(last_success: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Window {
    match last_success {
        Some(last) if last > now => Window::ClockSkew,
        _ if is_limited(last_success, now) => Window::Limited {
            remaining: remaining_window(last_success, now),
        },
        _ => Window::Open,
    }
}

fn window() -> TimeDelta {
    TimeDelta::seconds(RATE_LIMIT_WINDOW.as_secs() as i64)
}
