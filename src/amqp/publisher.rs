//! AMQP event publisher for outbound rating events

use crate::amqp::messages::{
    MessageEnvelope, MATCH_REJECTED_ROUTING_KEY, RATINGS_UPDATED_ROUTING_KEY,
    RATING_EVENTS_EXCHANGE,
};
use crate::config::app::AmqpSettings;
use crate::error::{RatingError, Result};
use crate::types::*;
use amqprs::{
    channel::{BasicPublishArguments, Channel, ExchangeDeclareArguments},
    BasicProperties,
};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Trait for publishing rating events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a RatingsUpdated event
    async fn publish_ratings_updated(&self, event: RatingsUpdated) -> Result<()>;

    /// Publish a MatchRejected event
    async fn publish_match_rejected(&self, event: MatchRejected) -> Result<()>;
}

/// Configuration for event publishing
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub exchange: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub enable_deduplication: bool,
    /// Most correlation ids remembered for deduplication
    pub deduplication_capacity: usize,
    pub publish_timeout_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            exchange: RATING_EVENTS_EXCHANGE.to_string(),
            max_retries: 3,
            retry_delay_ms: 500,
            enable_deduplication: true,
            deduplication_capacity: 10_000,
            publish_timeout_ms: 5000,
        }
    }
}

impl PublisherConfig {
    /// Publisher config using the exchange and retry policy from settings
    pub fn from_settings(settings: &AmqpSettings) -> Self {
        Self {
            exchange: settings.exchange_name.clone(),
            max_retries: settings.max_retry_attempts,
            retry_delay_ms: settings.retry_delay_ms,
            ..Self::default()
        }
    }
}

/// Correlation ids of recently published events
///
/// Holds at most `capacity` ids; the oldest is forgotten first.
#[derive(Debug)]
pub struct DeduplicationCache {
    capacity: usize,
    order: VecDeque<String>,
    ids: HashSet<String>,
}

impl DeduplicationCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::new(),
            ids: HashSet::new(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Remember an id, evicting the oldest ones past capacity
    pub fn insert(&mut self, id: String) {
        if self.capacity == 0 || !self.ids.insert(id.clone()) {
            return;
        }
        self.order.push_back(id);

        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// AMQP-based event publisher implementation
pub struct AmqpEventPublisher {
    channel: Channel,
    config: PublisherConfig,
    published_messages: std::sync::Mutex<DeduplicationCache>,
}

impl AmqpEventPublisher {
    /// Create a new event publisher
    pub async fn new(channel: Channel, config: PublisherConfig) -> Result<Self> {
        let published_messages =
            std::sync::Mutex::new(DeduplicationCache::new(config.deduplication_capacity));
        let publisher = Self {
            channel,
            config,
            published_messages,
        };

        publisher.setup_exchange().await?;

        Ok(publisher)
    }

    /// Declare the rating events exchange
    async fn setup_exchange(&self) -> Result<()> {
        let args = ExchangeDeclareArguments::new(&self.config.exchange, "topic")
            .durable(true)
            .finish();
        self.channel
            .exchange_declare(args)
            .await
            .map_err(|e| RatingError::AmqpConnectionFailed {
                message: format!(
                    "Failed to declare exchange {}: {}",
                    self.config.exchange, e
                ),
            })?;

        info!("Declared rating events exchange '{}'", self.config.exchange);
        Ok(())
    }

    /// Publish to the events exchange with retry logic
    ///
    /// With `deduplicate`, an envelope whose correlation id was published
    /// recently is skipped.
    async fn publish_with_retry<T>(
        &self,
        envelope: &MessageEnvelope<T>,
        deduplicate: bool,
    ) -> Result<()>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
    {
        let deduplicate = deduplicate && self.config.enable_deduplication;
        if deduplicate {
            let published_messages =
                self.published_messages
                    .lock()
                    .map_err(|_| RatingError::InternalError {
                        message: "Failed to acquire published messages lock".to_string(),
                    })?;
            if published_messages.contains(&envelope.correlation_id) {
                debug!(
                    "Message {} already published, skipping",
                    envelope.correlation_id
                );
                return Ok(());
            }
        }

        let mut retry_count = 0;
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);

        loop {
            match self.try_publish(envelope).await {
                Ok(_) => {
                    if deduplicate {
                        let mut published_messages =
                            self.published_messages.lock().map_err(|_| {
                                RatingError::InternalError {
                                    message: "Failed to acquire published messages lock"
                                        .to_string(),
                                }
                            })?;
                        published_messages.insert(envelope.correlation_id.clone());
                        debug!(
                            "{} correlation ids cached for deduplication",
                            published_messages.len()
                        );
                    }

                    debug!(
                        "Published message {} to {} with routing key {}",
                        envelope.correlation_id, self.config.exchange, envelope.routing_key
                    );
                    return Ok(());
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count > self.config.max_retries {
                        error!(
                            "Failed to publish message {} after {} retries: {}",
                            envelope.correlation_id, self.config.max_retries, e
                        );
                        return Err(e);
                    }

                    warn!(
                        "Publish attempt {} failed for message {}: {}. Retrying in {:?}",
                        retry_count, envelope.correlation_id, e, delay
                    );

                    sleep(delay).await;
                    delay = Duration::from_millis((delay.as_millis() as u64 * 2).min(5000));
                }
            }
        }
    }

    /// Single publish attempt
    async fn try_publish<T>(&self, envelope: &MessageEnvelope<T>) -> Result<()>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
    {
        let payload = envelope.to_bytes()?;

        let args = BasicPublishArguments::new(&self.config.exchange, &envelope.routing_key);
        let mut properties = BasicProperties::default();
        properties
            .with_message_id(&envelope.correlation_id)
            .with_timestamp(envelope.timestamp.timestamp() as u64)
            .with_content_type("application/json");

        let publish = self.channel.basic_publish(properties, payload, args);
        tokio::time::timeout(
            Duration::from_millis(self.config.publish_timeout_ms),
            publish,
        )
        .await
        .map_err(|_| RatingError::AmqpConnectionFailed {
            message: format!(
                "Publish timed out after {}ms",
                self.config.publish_timeout_ms
            ),
        })?
        .map_err(|e| RatingError::AmqpConnectionFailed {
            message: format!("Failed to publish message: {}", e),
        })?;

        Ok(())
    }
}

/// Envelope for a RatingsUpdated event, keyed by its match
pub fn ratings_updated_envelope(event: RatingsUpdated) -> MessageEnvelope<RatingsUpdated> {
    let correlation_id = format!("{}:{}", RATINGS_UPDATED_ROUTING_KEY, event.match_id);
    MessageEnvelope::with_correlation_id(
        event,
        RATINGS_UPDATED_ROUTING_KEY.to_string(),
        correlation_id,
    )
}

/// Envelope for a MatchRejected event
pub fn match_rejected_envelope(event: MatchRejected) -> MessageEnvelope<MatchRejected> {
    MessageEnvelope::new(event, MATCH_REJECTED_ROUTING_KEY.to_string())
}

#[async_trait]
impl EventPublisher for AmqpEventPublisher {
    async fn publish_ratings_updated(&self, event: RatingsUpdated) -> Result<()> {
        self.publish_with_retry(&ratings_updated_envelope(event), true)
            .await
    }

    async fn publish_match_rejected(&self, event: MatchRejected) -> Result<()> {
        // Rejections carry a fresh correlation id every time
        self.publish_with_retry(&match_rejected_envelope(event), false)
            .await
    }
}

/// Mock event publisher for testing
#[derive(Debug, Default)]
pub struct MockEventPublisher {
    published_events: std::sync::Mutex<Vec<String>>,
    ratings_updated: std::sync::Mutex<Vec<RatingsUpdated>>,
    match_rejected: std::sync::Mutex<Vec<MatchRejected>>,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all published event types (for testing)
    pub fn get_published_events(&self) -> Vec<String> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Published RatingsUpdated payloads
    pub fn get_ratings_updated(&self) -> Vec<RatingsUpdated> {
        self.ratings_updated
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Published MatchRejected payloads
    pub fn get_match_rejected(&self) -> Vec<MatchRejected> {
        self.match_rejected
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Clear published events (for testing)
    pub fn clear_events(&self) {
        if let Ok(mut events) = self.published_events.lock() {
            events.clear();
        }
        if let Ok(mut events) = self.ratings_updated.lock() {
            events.clear();
        }
        if let Ok(mut events) = self.match_rejected.lock() {
            events.clear();
        }
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish_ratings_updated(&self, event: RatingsUpdated) -> Result<()> {
        if let Ok(mut events) = self.published_events.lock() {
            events.push("RatingsUpdated".to_string());
        }
        if let Ok(mut events) = self.ratings_updated.lock() {
            events.push(event);
        }
        Ok(())
    }

    async fn publish_match_rejected(&self, event: MatchRejected) -> Result<()> {
        if let Ok(mut events) = self.published_events.lock() {
            events.push("MatchRejected".to_string());
        }
        if let Ok(mut events) = self.match_rejected.lock() {
            events.push(event);
        }
        Ok(())
    }
}
