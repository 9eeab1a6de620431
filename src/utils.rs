//! Utility functions for the rating service

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique match ID
pub fn generate_match_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Round to the nearest integer with halves going toward positive infinity
///
/// `f64::round` sends -2.5 to -3; published rating changes use -2.
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Fraction of `part` in `total`, zero when there is nothing to divide
pub fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        let id1 = generate_match_id();
        let id2 = generate_match_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(18.857), 19);
        assert_eq!(round_half_up(-8.571), -9);
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(-2.5), -2);
        assert_eq!(round_half_up(-0.4), 0);
        assert_eq!(round_half_up(1019.0), 1019);
    }

    #[test]
    fn test_ratio() {
        assert_eq!(ratio(1, 2), 0.5);
        assert_eq!(ratio(3, 3), 1.0);
        assert_eq!(ratio(0, 0), 0.0);
    }
}
