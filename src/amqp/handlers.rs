//! AMQP message handlers for processing match reports
//!
//! This module provides the consumer side of the service: deserializing
//! inbound match reports, forwarding them to a handler and acknowledging the
//! delivery once the handler has dealt with it.

use crate::amqp::messages::MessageUtils;
use crate::error::{RatingError, Result};
use crate::types::MatchReport;
use amqprs::{
    channel::{BasicAckArguments, BasicCancelArguments, BasicConsumeArguments, Channel},
    consumer::AsyncConsumer,
    BasicProperties, Deliver,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Trait defining the interface for handling AMQP messages
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle a match report
    async fn handle_match_report(&self, report: MatchReport) -> Result<()>;

    /// Handle a message that could not be processed
    async fn handle_error(&self, error: anyhow::Error, message_data: &[u8]);
}

/// Deserialize a delivery and pass it to the handler
///
/// Failures are reported to [`MessageHandler::handle_error`] and returned.
pub async fn dispatch_message(handler: &dyn MessageHandler, content: &[u8]) -> Result<()> {
    let result = async {
        let report = MessageUtils::deserialize_match_report(content)?;

        debug!(
            "Match report parsed - match_id: {}, team_a: {:?}, team_b: {:?}, score: {}-{}",
            report.match_id,
            report.team_a,
            report.team_b,
            report.team_a_score,
            report.team_b_score
        );

        handler.handle_match_report(report).await
    }
    .await;

    if let Err(e) = result {
        let reason = e.to_string();
        handler.handle_error(e, content).await;
        return Err(anyhow::anyhow!(reason));
    }

    Ok(())
}

/// Consumer for match report messages
pub struct MatchReportConsumer {
    handler: Arc<dyn MessageHandler>,
    channel: Channel,
    consumer_tag: String,
}

impl MatchReportConsumer {
    /// Create a new match report consumer
    pub fn new(handler: Arc<dyn MessageHandler>, channel: Channel) -> Self {
        let consumer_tag = format!("match-report-consumer-{}", uuid::Uuid::new_v4());

        Self {
            handler,
            channel,
            consumer_tag,
        }
    }

    /// Start consuming messages from the queue
    pub async fn start_consuming(&self, queue_name: &str) -> Result<()> {
        let args = BasicConsumeArguments::new(queue_name, &self.consumer_tag);

        self.channel
            .basic_consume(ReportConsumer::new(self.handler.clone()), args)
            .await
            .map_err(|e| RatingError::AmqpConnectionFailed {
                message: format!("Failed to start consuming: {}", e),
            })?;

        info!("Started consuming messages from queue: {}", queue_name);
        Ok(())
    }

    /// Stop consuming messages
    pub async fn stop_consuming(&self) -> Result<()> {
        let args = BasicCancelArguments::new(&self.consumer_tag);

        self.channel
            .basic_cancel(args)
            .await
            .map_err(|e| RatingError::AmqpConnectionFailed {
                message: format!("Failed to stop consuming: {}", e),
            })?;

        info!("Stopped consuming messages");
        Ok(())
    }
}

/// Internal consumer implementation
struct ReportConsumer {
    handler: Arc<dyn MessageHandler>,
}

impl ReportConsumer {
    fn new(handler: Arc<dyn MessageHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl AsyncConsumer for ReportConsumer {
    async fn consume(
        &mut self,
        channel: &Channel,
        deliver: Deliver,
        _basic_properties: BasicProperties,
        content: Vec<u8>,
    ) {
        let delivery_tag = deliver.delivery_tag();

        info!(
            "AMQP message received - delivery_tag: {}, routing_key: '{}', size: {} bytes",
            delivery_tag,
            deliver.routing_key(),
            content.len()
        );

        let start_time = std::time::Instant::now();

        match dispatch_message(self.handler.as_ref(), &content).await {
            Ok(_) => info!(
                "Message processed successfully - delivery_tag: {}, processing_time: {:.2}ms",
                delivery_tag,
                start_time.elapsed().as_secs_f64() * 1000.0
            ),
            Err(e) => error!(
                "Message processing failed - delivery_tag: {}, processing_time: {:.2}ms, error: {}",
                delivery_tag,
                start_time.elapsed().as_secs_f64() * 1000.0,
                e
            ),
        }

        // Rejected reports are answered with an event, so every delivery is acked
        if let Err(e) = channel
            .basic_ack(BasicAckArguments::new(delivery_tag, false))
            .await
        {
            warn!("Failed to ack delivery {}: {}", delivery_tag, e);
        }
    }
}

/// Mock message handler for testing
pub struct MockMessageHandler {
    pub received_reports: Arc<tokio::sync::Mutex<Vec<MatchReport>>>,
    pub errors: Arc<tokio::sync::Mutex<Vec<String>>>,
}

impl Default for MockMessageHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMessageHandler {
    pub fn new() -> Self {
        Self {
            received_reports: Arc::new(tokio::sync::Mutex::new(Vec::new())),
            errors: Arc::new(tokio::sync::Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl MessageHandler for MockMessageHandler {
    async fn handle_match_report(&self, report: MatchReport) -> Result<()> {
        let mut reports = self.received_reports.lock().await;
        reports.push(report);
        Ok(())
    }

    async fn handle_error(&self, error: anyhow::Error, _message_data: &[u8]) {
        let mut errors = self.errors.lock().await;
        errors.push(error.to_string());
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

    #[tokio::test]
    async fn test_mock_handler() {
        let handler = MockMessageHandler::new();
        let report = create_test_match_report();

        handler.handle_match_report(report.clone()).await.unwrap();

        let received = handler.received_reports.lock().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].match_id, report.match_id);
    }

    #[tokio::test]
    async fn test_dispatch_valid_message() {
        let handler = MockMessageHandler::new();
        let report = create_test_match_report();
        let bytes = serde_json::to_vec(&report).unwrap();

        dispatch_message(&handler, &bytes).await.unwrap();

        assert_eq!(handler.received_reports.lock().await.len(), 1);
        assert!(handler.errors.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_passes_decodable_tie_to_handler() {
        let handler = MockMessageHandler::new();
        let mut report = create_test_match_report();
        report.team_b_score = report.team_a_score;
        let bytes = serde_json::to_vec(&report).unwrap();

        dispatch_message(&handler, &bytes).await.unwrap();

        let received = handler.received_reports.lock().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].match_id, report.match_id);
        assert!(handler.errors.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_reports_errors_to_handler() {
        let handler = MockMessageHandler::new();

        assert!(dispatch_message(&handler, b"{\"garbage\": true}").await.is_err());

        assert!(handler.received_reports.lock().await.is_empty());
        let errors = handler.errors.lock().await;
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Invalid match report"));
    }
}
