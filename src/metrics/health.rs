//! Health check endpoints and Prometheus metrics server
//!
//! This module provides HTTP endpoints for health checks, Prometheus metrics
//! and read-only rating views for the club-ratings service using Axum.

use crate::metrics::collector::MetricsCollector;
use crate::service::app::AppState;
use crate::service::health::{HealthCheck, HealthStatus};
use crate::stats::{partnerships, player_summary, rivalries, DEFAULT_LIMIT, DEFAULT_MIN_MATCHES};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

const SERVICE_NAME: &str = "club-ratings";

/// Health server configuration
#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    /// Port to bind the health server to
    pub port: u16,
    /// Host to bind to (typically "0.0.0.0" for all interfaces)
    pub host: String,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Shared state for the health server
#[derive(Clone)]
pub struct HealthServerState {
    pub metrics_collector: Arc<MetricsCollector>,
    pub app_state: Option<Arc<AppState>>,
}

/// Health server that provides HTTP endpoints for monitoring
pub struct HealthServer {
    config: HealthServerConfig,
    state: HealthServerState,
    shutdown_tx: broadcast::Sender<()>,
}

/// `?limit=` and `?min_matches=` for list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
    pub min_matches: Option<u32>,
}

impl HealthServer {
    /// Create a new health server
    pub fn new(config: HealthServerConfig, metrics_collector: Arc<MetricsCollector>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            state: HealthServerState {
                metrics_collector,
                app_state: None,
            },
            shutdown_tx,
        }
    }

    /// Set the application state for health checks
    pub fn with_app_state(mut self, app_state: Arc<AppState>) -> Self {
        self.state.app_state = Some(app_state);
        self
    }

    /// Stop the server when `shutdown_tx` fires
    pub fn with_shutdown(mut self, shutdown_tx: broadcast::Sender<()>) -> Self {
        self.shutdown_tx = shutdown_tx;
        self
    }

    /// Start the health server
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid health server address")?;

        let app = self.create_router();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind health server to {}", addr))?;

        info!("Health server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Health server shutdown signal received");
            })
            .await?;

        info!("Health server stopped");
        Ok(())
    }

    /// Create the Axum router with all endpoints
    pub fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .route("/alive", get(alive_handler))
            .route("/metrics", get(metrics_handler))
            .route("/stats", get(stats_handler))
            .route("/leaderboard", get(leaderboard_handler))
            .route("/players/{player_id}", get(player_handler))
            .route("/rivalries", get(rivalries_handler))
            .route("/partnerships", get(partnerships_handler))
            .with_state(self.state.clone())
    }

    /// Stop the health server
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping health server...");

        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to health server: {}", e);
        }

        Ok(())
    }
}

fn not_initialized() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "service": SERVICE_NAME,
            "error": "Service not initialized",
            "timestamp": chrono::Utc::now()
        })),
    )
        .into_response()
}

fn internal_error(context: &str, e: anyhow::Error) -> Response {
    error!("{}: {}", context, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": context })),
    )
        .into_response()
}

/// Root endpoint handler - shows service information
async fn root_handler() -> impl IntoResponse {
    let info = json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/health",
            "/ready",
            "/alive",
            "/metrics",
            "/stats",
            "/leaderboard",
            "/players/{player_id}",
            "/rivalries",
            "/partnerships"
        ]
    });

    Json(info)
}

/// Lightweight health check endpoint handler
async fn health_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Health check requested");

    let status = match &state.app_state {
        Some(app_state) => HealthCheck::liveness_check(app_state.clone())
            .await
            .unwrap_or(HealthStatus::Unhealthy),
        None => return not_initialized(),
    };

    let code = if status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        code,
        Json(json!({
            "status": status,
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
        .into_response()
}

/// Readiness check endpoint handler
async fn ready_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Readiness check requested");

    match &state.app_state {
        Some(app_state) => match HealthCheck::readiness_check(app_state.clone()).await {
            Ok(HealthStatus::Healthy) => (StatusCode::OK, "Ready"),
            Ok(HealthStatus::Degraded) => (StatusCode::OK, "Degraded but ready"),
            Ok(HealthStatus::Unhealthy) => (StatusCode::SERVICE_UNAVAILABLE, "Not ready"),
            Err(e) => {
                error!("Readiness check failed: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
            }
        },
        None => (StatusCode::SERVICE_UNAVAILABLE, "Service not initialized"),
    }
}

/// Liveness check endpoint handler
async fn alive_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Liveness check requested");

    match &state.app_state {
        Some(app_state) => match HealthCheck::liveness_check(app_state.clone()).await {
            Ok(HealthStatus::Healthy) => (StatusCode::OK, "Alive"),
            _ => (StatusCode::SERVICE_UNAVAILABLE, "Not alive"),
        },
        None => (StatusCode::SERVICE_UNAVAILABLE, "Service not initialized"),
    }
}

/// Prometheus metrics endpoint handler
async fn metrics_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Metrics endpoint requested");

    let metric_families = state.metrics_collector.registry().gather();
    let encoder = TextEncoder::new();

    match encoder.encode_to_string(&metric_families) {
        Ok(metrics_output) => {
            debug!("Serving {} metric families", metric_families.len());
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, encoder.format_type().to_string())],
                metrics_output,
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}

/// Detailed service statistics endpoint handler
async fn stats_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Stats endpoint requested");

    let Some(app_state) = &state.app_state else {
        return not_initialized();
    };

    match HealthCheck::check(app_state.clone()).await {
        Ok(health) => {
            let stats = json!({
                "service": {
                    "name": SERVICE_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                    "status": health.status,
                    "uptime": health.stats.uptime_info
                },
                "matches": {
                    "processed": health.stats.matches_processed,
                    "rejected": health.stats.matches_rejected,
                    "pairings_rated": health.stats.pairings_rated
                },
                "players": {
                    "registered": health.stats.registered_players
                },
                "components": health.checks,
                "timestamp": chrono::Utc::now()
            });

            (StatusCode::OK, Json(stats)).into_response()
        }
        Err(e) => internal_error("Failed to get service stats", e),
    }
}

/// Players ordered by rating
async fn leaderboard_handler(
    State(state): State<HealthServerState>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    let Some(app_state) = &state.app_state else {
        return not_initialized();
    };

    match app_state.storage().leaderboard(params.limit) {
        Ok(players) => Json(players).into_response(),
        Err(e) => internal_error("Failed to read leaderboard", e),
    }
}

/// Summary of one player
async fn player_handler(
    State(state): State<HealthServerState>,
    Path(player_id): Path<String>,
) -> impl IntoResponse {
    let Some(app_state) = &state.app_state else {
        return not_initialized();
    };
    let storage = app_state.storage();

    let record = match storage.get_player(&player_id) {
        Ok(Some(record)) => record,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("Player not found: {}", player_id) })),
            )
                .into_response()
        }
        Err(e) => return internal_error("Failed to read player", e),
    };

    match storage.get_history(&player_id) {
        Ok(history) => Json(player_summary(&record, &history)).into_response(),
        Err(e) => internal_error("Failed to read player history", e),
    }
}

/// Closest singles rivalries
async fn rivalries_handler(
    State(state): State<HealthServerState>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    let Some(app_state) = &state.app_state else {
        return not_initialized();
    };

    match app_state.storage().get_matches() {
        Ok(matches) => Json(rivalries(
            &matches,
            params.min_matches.unwrap_or(DEFAULT_MIN_MATCHES),
            params.limit.unwrap_or(DEFAULT_LIMIT),
        ))
        .into_response(),
        Err(e) => internal_error("Failed to read matches", e),
    }
}

/// Most successful doubles partnerships
async fn partnerships_handler(
    State(state): State<HealthServerState>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    let Some(app_state) = &state.app_state else {
        return not_initialized();
    };

    match app_state.storage().get_matches() {
        Ok(matches) => Json(partnerships(
            &matches,
            params.min_matches.unwrap_or(DEFAULT_MIN_MATCHES),
            params.limit.unwrap_or(DEFAULT_LIMIT),
        ))
        .into_response(),
        Err(e) => internal_error("Failed to read matches", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amqp::publisher::MockEventPublisher;
    use crate::amqp::MessageHandler;
    use crate::config::AppConfig;
    use crate::rating::PlayerRecord;
    use crate::types::MatchReport;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt; // for oneshot

    fn create_test_server() -> HealthServer {
        let collector = Arc::new(MetricsCollector::new().expect("Failed to create collector"));
        HealthServer::new(HealthServerConfig::default(), collector)
    }

    async fn create_server_with_state() -> (HealthServer, Arc<AppState>) {
        let state =
            AppState::with_publisher(AppConfig::default(), Arc::new(MockEventPublisher::new()))
                .unwrap();
        state
            .storage()
            .store_players(vec![
                PlayerRecord::new("alice", "Alice", 1000.0),
                PlayerRecord::new("bob", "Bob", 1000.0),
            ])
            .unwrap();
        let state = Arc::new(state);

        let report = MatchReport {
            match_id: uuid::Uuid::new_v4(),
            team_a: vec!["alice".to_string()],
            team_b: vec!["bob".to_string()],
            team_a_score: 21,
            team_b_score: 15,
            played_at: None,
        };
        state
            .message_handler()
            .handle_match_report(report)
            .await
            .unwrap();

        let server = HealthServer::new(
            HealthServerConfig::default(),
            state.metrics_service().collector(),
        )
        .with_app_state(state.clone());
        (server, state)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_root_endpoint() {
        let app = create_test_server().create_router();

        let (status, body) = get(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "club-ratings");
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let server = create_test_server();
        server.state.metrics_collector.update_health_status(2);
        let app = server.create_router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().contains("text/plain"));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("club_ratings_health_status"));
    }

    #[tokio::test]
    async fn test_endpoints_without_app_state() {
        let app = create_test_server().create_router();

        for uri in [
            "/health",
            "/ready",
            "/alive",
            "/stats",
            "/leaderboard",
            "/players/alice",
            "/rivalries",
            "/partnerships",
        ] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_rating_views() {
        let (server, _state) = create_server_with_state().await;
        let app = server.create_router();

        let (status, body) = get(app.clone(), "/leaderboard?limit=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["id"], "alice");
        assert_eq!(body[0]["rating"], 1020.0);

        let (status, body) = get(app.clone(), "/players/bob").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["losses"], 1);
        assert_eq!(body["total_rating_change"], -7);

        let (status, _) = get(app.clone(), "/players/nobody").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = get(app.clone(), "/rivalries?min_matches=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, body) = get(app, "/partnerships").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stats_reports_processed_matches() {
        let (server, _state) = create_server_with_state().await;

        let (status, body) = get(server.create_router(), "/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["matches"]["processed"], 1);
        assert_eq!(body["players"]["registered"], 2);
    }

    #[tokio::test]
    async fn test_stopped_service_is_not_alive() {
        let (server, _state) = create_server_with_state().await;
        let app = server.create_router();

        let (status, body) = get(app.clone(), "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unhealthy");

        let response = app
            .oneshot(Request::builder().uri("/alive").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_health_server_config() {
        let config = HealthServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[tokio::test]
    async fn test_404_handling() {
        let app = create_test_server().create_router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
