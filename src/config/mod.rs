//! Configuration management for the club-ratings service
//!
//! This module handles all configuration loading from environment variables
//! and TOML files, validation, and default values for the rating service.

pub mod app;
pub mod rating;

// Re-export commonly used types
pub use app::{validate_config, AmqpSettings, AppConfig, ProcessingSettings, ServiceSettings};
pub use rating::{ActivityBase, RatingConfig};
