//! Metrics and monitoring for the club-ratings service
//!
//! This module provides Prometheus metrics collection and the HTTP server
//! exposing health checks, metrics and read-only rating views.

pub mod collector;
pub mod health;

pub use collector::{
    MatchMetrics, MetricsCollector, MetricsTimer, PerformanceMetrics, RatingMetrics,
    ServiceMetrics,
};
pub use health::{HealthServer, HealthServerConfig};

use crate::service::app::AppState;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

/// Unified metrics service that combines all monitoring capabilities
#[derive(Clone)]
pub struct MetricsService {
    collector: Arc<MetricsCollector>,
    server_config: HealthServerConfig,
    shutdown_tx: broadcast::Sender<()>,
}

impl MetricsService {
    /// Create a new metrics service
    pub fn new(collector: Arc<MetricsCollector>, server_config: HealthServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            collector,
            server_config,
            shutdown_tx,
        }
    }

    /// Get the metrics collector
    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Build a health server bound to this service's shutdown signal
    pub fn health_server(&self, app_state: Option<Arc<AppState>>) -> HealthServer {
        let server = HealthServer::new(self.server_config.clone(), self.collector.clone())
            .with_shutdown(self.shutdown_tx.clone());

        match app_state {
            Some(app_state) => server.with_app_state(app_state),
            None => server,
        }
    }

    /// Stop every health server built by this service
    pub async fn stop(&self) -> anyhow::Result<()> {
        if self.shutdown_tx.send(()).is_err() {
            warn!("No running health server to stop");
        }
        Ok(())
    }
}
