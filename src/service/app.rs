//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the match
//! processor to player storage, the AMQP consumer and publisher, the metrics
//! service and background tasks.

use crate::amqp::connection::{AmqpConfig, AmqpConnection};
use crate::amqp::handlers::{MatchReportConsumer, MessageHandler};
use crate::amqp::messages::MATCH_REPORT_ROUTING_KEY;
use crate::amqp::publisher::{AmqpEventPublisher, EventPublisher, PublisherConfig};
use crate::config::AppConfig;
use crate::error::{error_kind, Result as RatingResult};
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{MetricsCollector, MetricsService};
use crate::processing::MatchProcessor;
use crate::rating::{load_roster, ClubRatingCalculator, InMemoryPlayerStorage, PlayerStorage};
use crate::types::{MatchRejected, MatchReport};
use crate::utils::current_timestamp;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("AMQP connection error: {message}")]
    AmqpConnection { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Message handler applying match reports and answering with rating events
pub struct RatingReportHandler {
    processor: Arc<MatchProcessor>,
    publisher: Arc<dyn EventPublisher>,
    metrics: Arc<MetricsCollector>,
}

impl RatingReportHandler {
    pub fn new(
        processor: Arc<MatchProcessor>,
        publisher: Arc<dyn EventPublisher>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            processor,
            publisher,
            metrics,
        }
    }

    async fn publish_rejection(&self, rejection: MatchRejected) {
        let timer = self.metrics.start_timer();
        let result = self.publisher.publish_match_rejected(rejection).await;
        self.metrics
            .record_amqp_operation("publish_rejected", result.is_ok(), timer.stop());

        if let Err(e) = result {
            error!("Failed to publish match rejection: {}", e);
        }
    }
}

#[async_trait]
impl MessageHandler for RatingReportHandler {
    async fn handle_match_report(&self, report: MatchReport) -> RatingResult<()> {
        let timer = self.metrics.start_timer();
        let match_id = report.match_id;

        info!(
            "Processing match report - match: {}, score: {}-{}",
            match_id, report.team_a_score, report.team_b_score
        );

        match self.processor.process_match(report).await {
            Ok(result) => {
                let duration = timer.stop();
                self.metrics.record_match_processed(&result, duration);
                self.metrics.record_rating_calculation(result.calculation_time);

                info!(
                    "Match processed - match: {}, format: {}, players: {}, time: {:.2}ms",
                    match_id,
                    result.format(),
                    result.player_updates.len(),
                    duration.as_secs_f64() * 1000.0
                );

                let publish_timer = self.metrics.start_timer();
                let published = self.publisher.publish_ratings_updated(result.to_event()).await;
                self.metrics.record_amqp_operation(
                    "publish_ratings",
                    published.is_ok(),
                    publish_timer.stop(),
                );

                // Ratings are already stored, so a failed publish is logged, not retried here
                if let Err(e) = published {
                    error!("Failed to publish ratings for match {}: {}", match_id, e);
                }
                Ok(())
            }
            Err(e) => {
                let kind = error_kind(&e);
                self.metrics.record_match_rejected(kind, timer.stop());
                debug!("Answering rejected match {} ({})", match_id, kind);

                self.publish_rejection(MatchRejected {
                    match_id: Some(match_id),
                    reason: e.to_string(),
                    error_kind: kind.to_string(),
                    timestamp: current_timestamp(),
                })
                .await;
                Ok(())
            }
        }
    }

    async fn handle_error(&self, error: anyhow::Error, message_data: &[u8]) {
        error!(
            "Undeliverable match report - error: '{}', message_size: {} bytes",
            error,
            message_data.len()
        );

        if !message_data.is_empty() {
            let preview_len = std::cmp::min(100, message_data.len());
            let preview = String::from_utf8_lossy(&message_data[..preview_len]);
            debug!("Message preview: {:?}", preview);
        }

        let kind = error_kind(&error);
        self.metrics.record_match_rejected(kind, Duration::ZERO);
        self.publish_rejection(MatchRejected {
            match_id: None,
            reason: error.to_string(),
            error_kind: kind.to_string(),
            timestamp: current_timestamp(),
        })
        .await;
    }
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Player records, match records and history
    storage: Arc<dyn PlayerStorage>,

    /// Match processing pipeline
    processor: Arc<MatchProcessor>,

    /// Outbound rating events
    publisher: Arc<dyn EventPublisher>,

    /// AMQP connection, absent when running without a broker
    amqp_connection: Option<Arc<AmqpConnection>>,

    /// Metrics service for monitoring and health checks
    metrics_service: Arc<MetricsService>,

    /// Background task handles
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    /// AMQP consumer for match reports
    consumer: Mutex<Option<MatchReportConsumer>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,

    started_at: Instant,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing club-ratings service");
        info!(
            "Configuration: service={}, amqp_url={}",
            config.service.name, config.amqp.url
        );

        let amqp_connection = Self::initialize_amqp(&config).await?;
        let publisher = Self::initialize_publisher(&config, &amqp_connection).await?;

        Self::assemble(config, publisher, Some(amqp_connection))
    }

    /// Initialize the application without a broker, publishing through `publisher`
    pub fn with_publisher(
        config: AppConfig,
        publisher: Arc<dyn EventPublisher>,
    ) -> Result<Self, ServiceError> {
        Self::assemble(config, publisher, None)
    }

    fn assemble(
        config: AppConfig,
        publisher: Arc<dyn EventPublisher>,
        amqp_connection: Option<Arc<AmqpConnection>>,
    ) -> Result<Self, ServiceError> {
        let metrics_service = Self::initialize_metrics(&config)?;
        let storage = Self::initialize_storage(&config)?;

        let calculator = ClubRatingCalculator::new(config.rating.clone()).map_err(|e| {
            ServiceError::Configuration {
                message: format!("Invalid rating configuration: {}", e),
            }
        })?;
        let processor = Arc::new(MatchProcessor::new(
            Arc::new(calculator),
            storage.clone(),
            config.processing.clone(),
        ));

        Ok(Self {
            config,
            storage,
            processor,
            publisher,
            amqp_connection,
            metrics_service,
            background_tasks: Mutex::new(Vec::new()),
            consumer: Mutex::new(None),
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        })
    }

    /// Start all background services and message consumption
    pub async fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting club-ratings service");

        *self.is_running.write().await = true;

        self.start_metrics_service().await?;

        if self.amqp_connection.is_some() {
            self.start_amqp_consumption().await?;
        } else {
            warn!("No AMQP connection - match reports will not be consumed");
        }

        self.start_background_tasks().await;

        info!("✅ Club-ratings service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of club-ratings service");

        *self.is_running.write().await = false;

        if let Some(consumer) = self.consumer.lock().await.take() {
            if let Err(e) = consumer.stop_consuming().await {
                warn!("Failed to stop AMQP consumer: {}", e);
            } else {
                info!("✅ AMQP message consumption stopped");
            }
        }

        info!("Stopping metrics service...");
        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop metrics service: {}", e);
        } else {
            info!("✅ Metrics service stopped");
        }

        self.stop_background_tasks().await;

        let final_stats =
            self.processor
                .stats()
                .map_err(|e| ServiceError::BackgroundTask {
                    message: format!("Failed to get final stats: {}", e),
                })?;

        info!("Final processor statistics: {:?}", final_stats);
        info!("✅ Club-ratings service shutdown completed");

        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Get the match processor
    pub fn processor(&self) -> Arc<MatchProcessor> {
        self.processor.clone()
    }

    /// Get player storage
    pub fn storage(&self) -> Arc<dyn PlayerStorage> {
        self.storage.clone()
    }

    /// Get the event publisher
    pub fn publisher(&self) -> Arc<dyn EventPublisher> {
        self.publisher.clone()
    }

    /// Get metrics service
    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }

    /// Get AMQP connection for health checks
    pub fn amqp_connection(&self) -> Option<Arc<AmqpConnection>> {
        self.amqp_connection.clone()
    }

    /// Time since the state was created
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Handler wired to this state's processor, publisher and metrics
    pub fn message_handler(&self) -> Arc<RatingReportHandler> {
        Arc::new(RatingReportHandler::new(
            self.processor.clone(),
            self.publisher.clone(),
            self.metrics_service.collector(),
        ))
    }

    /// Initialize metrics service
    fn initialize_metrics(config: &AppConfig) -> Result<Arc<MetricsService>, ServiceError> {
        info!(
            "Initializing metrics service on port {}",
            config.service.metrics_port
        );

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let health_config = HealthServerConfig {
            port: config.service.metrics_port,
            host: "0.0.0.0".to_string(),
        };

        Ok(Arc::new(MetricsService::new(
            metrics_collector,
            health_config,
        )))
    }

    /// Create player storage and load the configured roster
    fn initialize_storage(config: &AppConfig) -> Result<Arc<dyn PlayerStorage>, ServiceError> {
        let storage = Arc::new(InMemoryPlayerStorage::new());

        if let Some(roster) = &config.processing.roster_file {
            load_roster(Path::new(roster), storage.as_ref()).map_err(|e| {
                ServiceError::Initialization {
                    message: format!("Failed to load player roster: {}", e),
                }
            })?;
        } else {
            warn!("No player roster configured - storage starts empty");
        }

        Ok(storage)
    }

    /// Start metrics service
    async fn start_metrics_service(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting metrics and health endpoints");

        let server = self.metrics_service.health_server(Some(self.clone()));
        let port = self.config.service.metrics_port;

        // The task owns the server, which holds a reference back to this state
        let metrics_handle = tokio::spawn(async move {
            if let Err(e) = server.start().await {
                error!("Metrics service failed: {}", e);
            } else {
                info!("Metrics service task completed");
            }
        });

        self.background_tasks.lock().await.push(metrics_handle);

        // Give the server a moment to start up
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        info!("✅ Metrics service started on port {}", port);
        Ok(())
    }

    /// Initialize AMQP connection with retry logic
    async fn initialize_amqp(config: &AppConfig) -> Result<Arc<AmqpConnection>, ServiceError> {
        info!("Connecting to AMQP broker: {}", config.amqp.url);

        let amqp_config =
            AmqpConfig::from_settings(&config.amqp).map_err(|e| ServiceError::Configuration {
                message: format!("Failed to parse AMQP URL: {}", e),
            })?;

        let connection =
            AmqpConnection::new(amqp_config)
                .await
                .map_err(|e| ServiceError::AmqpConnection {
                    message: format!("Failed to connect to AMQP: {}", e),
                })?;

        Ok(Arc::new(connection))
    }

    /// Open a publishing channel and declare the events exchange
    async fn initialize_publisher(
        config: &AppConfig,
        amqp_connection: &AmqpConnection,
    ) -> Result<Arc<dyn EventPublisher>, ServiceError> {
        let channel = amqp_connection
            .connection()
            .open_channel(None)
            .await
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to open AMQP channel: {}", e),
            })?;

        let publisher = AmqpEventPublisher::new(channel, PublisherConfig::from_settings(&config.amqp))
            .await
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to initialize event publisher: {}", e),
            })?;

        Ok(Arc::new(publisher))
    }

    /// Start AMQP message consumption
    async fn start_amqp_consumption(&self) -> Result<(), ServiceError> {
        let Some(connection) = &self.amqp_connection else {
            return Ok(());
        };
        let queue_name = self.config.amqp.queue_name.as_str();

        info!("Opening AMQP channel for message consumption...");
        let channel = connection
            .connection()
            .open_channel(None)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to open consumer channel: {}", e),
            })?;

        info!("Declaring queue: '{}'...", queue_name);
        let queue_declare_args = amqprs::channel::QueueDeclareArguments::new(queue_name)
            .durable(true)
            .auto_delete(false)
            .finish();

        channel
            .queue_declare(queue_declare_args)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to declare queue {}: {}", queue_name, e),
            })?;

        // Reports published to the events exchange are routed to the queue too
        channel
            .queue_bind(amqprs::channel::QueueBindArguments::new(
                queue_name,
                &self.config.amqp.exchange_name,
                MATCH_REPORT_ROUTING_KEY,
            ))
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to bind queue {}: {}", queue_name, e),
            })?;

        let consumer = MatchReportConsumer::new(self.message_handler(), channel);
        consumer
            .start_consuming(queue_name)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to start consuming messages: {}", e),
            })?;

        *self.consumer.lock().await = Some(consumer);

        info!(
            "AMQP message consumption started successfully on queue: '{}'",
            queue_name
        );
        Ok(())
    }

    /// Start background maintenance tasks
    async fn start_background_tasks(&self) {
        info!("Starting background maintenance tasks...");

        // Rating gauges
        let gauge_task = {
            let storage = self.storage.clone();
            let metrics_collector = self.metrics_service.collector();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(30));
                info!("Rating metrics task started");

                while *is_running.read().await {
                    interval.tick().await;

                    match storage.get_all_players() {
                        Ok(players) => {
                            let players: Vec<_> = players.into_values().collect();
                            debug!("Updating rating metrics - players: {}", players.len());
                            metrics_collector.update_from_players(&players);
                        }
                        Err(e) => {
                            warn!("Failed to read players for metrics update: {}", e);
                        }
                    }
                }

                info!("Rating metrics task stopped");
            })
        };

        // Service health metrics
        let health_metrics_task = {
            let metrics_collector = self.metrics_service.collector();
            let processor = self.processor.clone();
            let amqp_connection = self.amqp_connection.clone();
            let is_running = self.is_running.clone();
            let started_at = self.started_at;

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(15));
                info!("Health metrics task started");

                while *is_running.read().await {
                    interval.tick().await;

                    let uptime_seconds = started_at.elapsed().as_secs() as i64;
                    metrics_collector
                        .service()
                        .uptime_seconds
                        .set(uptime_seconds);

                    let processor_ok = processor.stats().is_ok();
                    let amqp_ok = amqp_connection
                        .as_ref()
                        .map(|connection| connection.is_alive())
                        .unwrap_or(false);

                    metrics_collector.update_component_health("processor", processor_ok);
                    metrics_collector.update_component_health("amqp", amqp_ok);

                    let status = match (processor_ok, amqp_ok) {
                        (true, true) => 2,
                        (true, false) => 1,
                        _ => 0,
                    };
                    metrics_collector.update_health_status(status);

                    debug!(
                        "Updated service health metrics - uptime: {}s, status: {}",
                        uptime_seconds, status
                    );
                }

                info!("Health metrics task stopped");
            })
        };

        let mut tasks = self.background_tasks.lock().await;
        tasks.push(gauge_task);
        tasks.push(health_metrics_task);

        info!("Background maintenance tasks started");
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&self) {
        let mut tasks = self.background_tasks.lock().await;
        let task_count = tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);

        for (i, task) in tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        info!("✅ All {} background tasks stopped", task_count);
    }
}
