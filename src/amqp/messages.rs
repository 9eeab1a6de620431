//! AMQP message definitions and serialization

use crate::error::{RatingError, Result};
use crate::types::*;
use serde_json;

/// AMQP queue and exchange names
pub const MATCH_REPORT_QUEUE: &str = "ratings.match_reports";
pub const RATING_EVENTS_EXCHANGE: &str = "ratings.events";

/// Routing keys for events
pub const MATCH_REPORT_ROUTING_KEY: &str = "match.report";
pub const RATINGS_UPDATED_ROUTING_KEY: &str = "ratings.updated";
pub const MATCH_REJECTED_ROUTING_KEY: &str = "match.rejected";

/// Message envelope with metadata
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageEnvelope<T> {
    pub payload: T,
    pub correlation_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub routing_key: String,
}

impl<T> MessageEnvelope<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    /// Create a new message envelope
    pub fn new(payload: T, routing_key: String) -> Self {
        Self {
            payload,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now(),
            routing_key,
        }
    }

    /// Create an envelope with a caller-chosen correlation id
    ///
    /// Events derived from a match reuse the match id, so a redelivered report
    /// does not publish its ratings twice.
    pub fn with_correlation_id(payload: T, routing_key: String, correlation_id: String) -> Self {
        Self {
            correlation_id,
            ..Self::new(payload, routing_key)
        }
    }

    /// Serialize the envelope to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            RatingError::InternalError {
                message: format!("Failed to serialize message: {}", e),
            }
            .into()
        })
    }

    /// Deserialize envelope from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            RatingError::InvalidMatchReport {
                reason: format!("Failed to deserialize message: {}", e),
            }
            .into()
        })
    }
}

/// Message serialization utilities
pub struct MessageUtils;

impl MessageUtils {
    /// Serialize a match report to bytes
    pub fn serialize_match_report(report: &MatchReport) -> Result<Vec<u8>> {
        serde_json::to_vec(report).map_err(|e| {
            RatingError::InternalError {
                message: format!("Failed to serialize match report: {}", e),
            }
            .into()
        })
    }

    /// Deserialize a match report from bytes
    ///
    /// Accepts a bare report or one wrapped in a [`MessageEnvelope`]. Only the
    /// shape is checked here; the processor validates the contents.
    pub fn deserialize_match_report(bytes: &[u8]) -> Result<MatchReport> {
        match serde_json::from_slice::<MatchReport>(bytes) {
            Ok(report) => Ok(report),
            Err(bare_err) => MessageEnvelope::<MatchReport>::from_bytes(bytes)
                .map(|envelope| envelope.payload)
                .map_err(|_| {
                    RatingError::InvalidMatchReport {
                        reason: format!("Failed to deserialize match report: {}", bare_err),
                    }
                    .into()
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_match_report() -> MatchReport {
        MatchReport {
            match_id: uuid::Uuid::new_v4(),
            team_a: vec!["alice".to_string()],
            team_b: vec!["bob".to_string()],
            team_a_score: 21,
            team_b_score: 15,
            played_at: None,
        }
    }

    #[test]
    fn test_message_envelope_creation() {
        let report = create_test_match_report();
        let envelope = MessageEnvelope::new(report, "test.routing.key".to_string());

        assert_eq!(envelope.routing_key, "test.routing.key");
        assert!(!envelope.correlation_id.is_empty());

        let report = create_test_match_report();
        let id = report.match_id.to_string();
        let envelope =
            MessageEnvelope::with_correlation_id(report, "x".to_string(), id.clone());
        assert_eq!(envelope.correlation_id, id);
    }

    #[test]
    fn test_deserialize_bare_and_enveloped_reports() {
        let report = create_test_match_report();

        let bare = MessageUtils::serialize_match_report(&report).unwrap();
        let parsed = MessageUtils::deserialize_match_report(&bare).unwrap();
        assert_eq!(parsed.match_id, report.match_id);
        assert_eq!(parsed.team_a, report.team_a);

        let envelope = MessageEnvelope::new(report.clone(), MATCH_REPORT_ROUTING_KEY.to_string());
        let wrapped = envelope.to_bytes().unwrap();
        let parsed = MessageUtils::deserialize_match_report(&wrapped).unwrap();
        assert_eq!(parsed.match_id, report.match_id);
    }

    #[test]
    fn test_deserialize_rejects_malformed_payloads() {
        assert!(MessageUtils::deserialize_match_report(b"not json").is_err());

        // Negative scores do not fit the unsigned score fields
        let negative = format!(
            r#"{{"match_id":"{}","team_a":["a"],"team_b":["b"],"team_a_score":-1,"team_b_score":21}}"#,
            uuid::Uuid::new_v4()
        );
        let err = MessageUtils::deserialize_match_report(negative.as_bytes()).unwrap_err();
        assert_eq!(crate::error::error_kind(&err), "invalid_report");
    }

    #[test]
    fn test_deserialize_keeps_decodable_but_invalid_reports() {
        let mut tied = create_test_match_report();
        tied.team_b_score = tied.team_a_score;
        let bytes = serde_json::to_vec(&tied).unwrap();

        let parsed = MessageUtils::deserialize_match_report(&bytes).unwrap();
        assert_eq!(parsed.match_id, tied.match_id);
        assert_eq!(parsed.team_a_score, parsed.team_b_score);
    }
}
