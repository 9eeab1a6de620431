//! AMQP integration for the rating service
//!
//! This module handles the AMQP connection, consumption of match reports and
//! publishing of rating events.

pub mod connection;
pub mod handlers;
pub mod messages;
pub mod publisher;

// Re-export commonly used types
pub use connection::{AmqpConfig, AmqpConnection};
pub use handlers::{MatchReportConsumer, MessageHandler};
pub use messages::*;
pub use publisher::EventPublisher;
