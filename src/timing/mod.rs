//! Timing wrappers that control how often a callback runs.

mod debounce;
mod throttle;

pub use debounce::{debounce, Debounced, DEFAULT_WAIT};
pub use throttle::{throttle, ThrottleOptions, Throttled, DEFAULT_INTERVAL};

use std::time::Duration;

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
