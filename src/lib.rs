//! Club Ratings - rating update service for club players
//!
//! This crate rates singles and doubles matches with a margin- and
//! activity-aware Elo variant, keeps player records and history, and runs as
//! an AMQP-driven service with Prometheus metrics.

pub mod amqp;
pub mod config;
pub mod error;
pub mod metrics;
pub mod processing;
pub mod rating;
pub mod service;
pub mod stats;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{RatingError, Result};
pub use types::*;

// Re-export key components
pub use amqp::publisher::EventPublisher;
pub use processing::{MatchProcessingResult, MatchProcessor};
pub use rating::{update_ratings, PlayerStorage, RatingCalculator, RatingEngine};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
