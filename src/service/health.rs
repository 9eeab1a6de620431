//! Health check endpoints and monitoring
//!
//! This module provides health check functionality for the club-ratings
//! service, including readiness and liveness checks.

use crate::service::app::AppState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Gauge value used by the health metric
    pub fn as_metric(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    fn combine(&mut self, other: &HealthStatus) {
        match other {
            HealthStatus::Unhealthy => *self = HealthStatus::Unhealthy,
            HealthStatus::Degraded if *self == HealthStatus::Healthy => {
                *self = HealthStatus::Degraded
            }
            _ => {}
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Players known to storage
    pub registered_players: usize,
    /// Matches applied since service start
    pub matches_processed: u64,
    /// Reports rejected since service start
    pub matches_rejected: u64,
    /// Winner/loser pairings rated since service start
    pub pairings_rated: u64,
    /// Service uptime information
    pub uptime_info: String,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let service_check = Self::check_service_running(&app_state).await;
        Ok(Self::build(&app_state, vec![service_check]))
    }

    /// Check storage, processor and broker without requiring a started service
    pub async fn check_dependencies(app_state: Arc<AppState>) -> Result<Self> {
        Ok(Self::build(&app_state, Vec::new()))
    }

    fn build(app_state: &AppState, mut checks: Vec<ComponentCheck>) -> Self {
        checks.push(Self::check_storage(app_state));
        checks.push(Self::check_processor(app_state));
        checks.push(Self::check_amqp_health(app_state));

        let mut status = HealthStatus::Healthy;
        for check in &checks {
            status.combine(&check.status);
        }

        HealthCheck {
            status,
            service: app_state.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats: Self::gather_service_stats(app_state),
        }
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if app_state.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify service can handle match reports
    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if !app_state.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        let mut status = Self::check_storage(&app_state).status;
        status.combine(&Self::check_processor(&app_state).status);
        Ok(status)
    }

    /// Check if service is running
    async fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if app_state.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Check that player storage answers
    fn check_storage(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match app_state.storage().player_count() {
            Ok(0) => (
                HealthStatus::Degraded,
                Some("No players registered".to_string()),
            ),
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Storage health check failed: {}", e);
                (
                    HealthStatus::Unhealthy,
                    Some(format!("Storage unavailable: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "player_storage".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Check match processor health
    fn check_processor(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match app_state.processor().stats() {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Processor stats check failed: {}", e);
                (
                    HealthStatus::Degraded,
                    Some(format!("Stats check failed: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "match_processor".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Check AMQP health
    fn check_amqp_health(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match app_state.amqp_connection() {
            Some(connection) if connection.is_alive() => (HealthStatus::Healthy, None),
            Some(_) => (
                HealthStatus::Unhealthy,
                Some("AMQP connection closed".to_string()),
            ),
            None => (
                HealthStatus::Degraded,
                Some("No AMQP connection configured".to_string()),
            ),
        };

        ComponentCheck {
            name: "amqp_connection".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Gather current service statistics
    fn gather_service_stats(app_state: &AppState) -> ServiceStats {
        let uptime_info = format!("Up {}s", app_state.uptime().as_secs());
        let registered_players = app_state.storage().player_count().unwrap_or(0);

        match app_state.processor().stats() {
            Ok(stats) => ServiceStats {
                registered_players,
                matches_processed: stats.matches_processed,
                matches_rejected: stats.matches_rejected,
                pairings_rated: stats.pairings_rated,
                uptime_info,
            },
            Err(e) => {
                debug!("Failed to get processor stats for health check: {}", e);
                ServiceStats {
                    registered_players,
                    uptime_info,
                    ..ServiceStats::default()
                }
            }
        }
    }
}

/// Convert health check to JSON string
impl HealthCheck {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amqp::publisher::MockEventPublisher;
    use crate::config::AppConfig;
    use crate::rating::PlayerRecord;

    fn create_test_state(players: usize) -> Arc<AppState> {
        let state =
            AppState::with_publisher(AppConfig::default(), Arc::new(MockEventPublisher::new()))
                .unwrap();
        let records = (0..players)
            .map(|i| PlayerRecord::new(format!("p{}", i), format!("Player {}", i), 1000.0))
            .collect();
        state.storage().store_players(records).unwrap();
        Arc::new(state)
    }

    #[test]
    fn test_status_combination() {
        let mut status = HealthStatus::Healthy;
        status.combine(&HealthStatus::Degraded);
        assert_eq!(status, HealthStatus::Degraded);
        status.combine(&HealthStatus::Healthy);
        assert_eq!(status, HealthStatus::Degraded);
        status.combine(&HealthStatus::Unhealthy);
        assert_eq!(status, HealthStatus::Unhealthy);
        status.combine(&HealthStatus::Degraded);
        assert_eq!(status, HealthStatus::Unhealthy);

        assert_eq!(HealthStatus::Healthy.as_metric(), 2);
    }

    #[tokio::test]
    async fn test_stopped_service_is_unhealthy() {
        let state = create_test_state(2);

        let health = HealthCheck::check(state.clone()).await.unwrap();
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert_eq!(health.stats.registered_players, 2);
        assert_eq!(health.checks.len(), 4);

        assert_eq!(
            HealthCheck::liveness_check(state.clone()).await.unwrap(),
            HealthStatus::Unhealthy
        );
        assert_eq!(
            HealthCheck::readiness_check(state).await.unwrap(),
            HealthStatus::Unhealthy
        );
    }

    #[tokio::test]
    async fn test_dependencies_without_broker_are_degraded() {
        let health = HealthCheck::check_dependencies(create_test_state(2))
            .await
            .unwrap();

        assert_eq!(health.status, HealthStatus::Degraded);
        let amqp = health
            .checks
            .iter()
            .find(|c| c.name == "amqp_connection")
            .unwrap();
        assert_eq!(amqp.status, HealthStatus::Degraded);
        assert!(health.to_json().unwrap().contains("match_processor"));
    }

    #[tokio::test]
    async fn test_empty_storage_is_degraded() {
        let health = HealthCheck::check_dependencies(create_test_state(0))
            .await
            .unwrap();

        let storage = health
            .checks
            .iter()
            .find(|c| c.name == "player_storage")
            .unwrap();
        assert_eq!(storage.status, HealthStatus::Degraded);
    }
}
