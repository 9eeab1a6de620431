//! Error types for the rating service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific rating scenarios
#[derive(Debug, thiserror::Error)]
pub enum RatingError {
    #[error("AMQP connection failed: {message}")]
    AmqpConnectionFailed { message: String },

    #[error("Invalid match report: {reason}")]
    InvalidMatchReport { reason: String },

    #[error("Player not found: {player_id}")]
    PlayerNotFound { player_id: String },

    #[error("Rating calculation failed: {reason}")]
    RatingCalculationFailed { reason: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl RatingError {
    /// Short machine-readable label, used for metrics and rejection events
    pub fn kind(&self) -> &'static str {
        match self {
            RatingError::AmqpConnectionFailed { .. } => "amqp",
            RatingError::InvalidMatchReport { .. } => "invalid_report",
            RatingError::PlayerNotFound { .. } => "player_not_found",
            RatingError::RatingCalculationFailed { .. } => "calculation",
            RatingError::StorageError { .. } => "storage",
            RatingError::ConfigurationError { .. } => "configuration",
            RatingError::InternalError { .. } => "internal",
        }
    }
}

/// Label for any error, falling back to "internal" for foreign errors
pub fn error_kind(error: &anyhow::Error) -> &'static str {
    error
        .downcast_ref::<RatingError>()
        .map(RatingError::kind)
        .unwrap_or("internal")
}
