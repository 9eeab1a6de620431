//! Days-inactive calculation feeding the activity adjustment

use chrono::{DateTime, Utc};

/// Whole days between `last_played_at` and `now`
///
/// A player who never played counts as active (0). Timestamps in the future,
/// e.g. from clock skew between writers, also yield 0.
pub fn days_inactive(last_played_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u32 {
    let Some(last_played_at) = last_played_at else {
        return 0;
    };

    // num_days truncates toward zero, which is a floor for non-negative spans
    let days = now.signed_duration_since(last_played_at).num_days();
    days.clamp(0, u32::MAX as i64) as u32
}

/// [`days_inactive`] measured against the current time
pub fn days_inactive_now(last_played_at: Option<DateTime<Utc>>) -> u32 {
    days_inactive(last_played_at, crate::utils::current_timestamp())
}
