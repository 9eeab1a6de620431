//! Club rating system
//!
//! This module provides the pure rating engine, the days-inactive helper,
//! the calculator interface used by match processing, player storage and
//! roster loading.

pub mod calculator;
pub mod engine;
pub mod inactivity;
pub mod roster;
pub mod storage;

// Re-export commonly used types
pub use calculator::{ClubRatingCalculator, MockRatingCalculator, RatingCalculator};
pub use engine::{update_ratings, PerformanceAdjustment, RatingEngine};
pub use inactivity::{days_inactive, days_inactive_now};
pub use roster::{load_roster, parse_roster, RosterEntry};
pub use storage::{InMemoryPlayerStorage, MockPlayerStorage, PlayerRecord, PlayerStorage};
