//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the club-ratings service using
//! Prometheus metrics.

use crate::processing::processor::MatchProcessingResult;
use crate::rating::storage::PlayerRecord;
use anyhow::Result;
use prometheus::{
    Gauge, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the rating service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Match processing metrics
    match_metrics: MatchMetrics,

    /// Rating distribution metrics
    rating_metrics: RatingMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Total AMQP messages processed
    pub amqp_messages_total: IntCounterVec,

    /// AMQP message processing errors
    pub amqp_errors_total: IntCounterVec,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Match processing metrics
#[derive(Clone)]
pub struct MatchMetrics {
    /// Matches applied, by format
    pub matches_processed_total: IntCounterVec,

    /// Reports rejected, by error kind
    pub matches_rejected_total: IntCounterVec,

    /// Winner/loser pairings rated
    pub pairings_rated_total: IntCounter,

    /// Players left out of a match because they had no record
    pub players_skipped_total: IntCounter,
}

/// Rating metrics
#[derive(Clone)]
pub struct RatingMetrics {
    /// Per-player rating change, by outcome
    pub rating_change: HistogramVec,

    /// Number of registered players
    pub registered_players: IntGauge,

    /// Mean rating over all players
    pub average_rating: Gauge,

    /// Highest rating of any player
    pub highest_rating: Gauge,

    /// Players currently on a significant-win streak
    pub players_on_streak: IntGauge,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// End-to-end match processing time
    pub match_processing_duration: Histogram,

    /// Rating calculation time
    pub rating_calculation_duration: Histogram,

    /// AMQP operation durations
    pub amqp_operation_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let match_metrics = MatchMetrics::new(&registry)?;
        let rating_metrics = RatingMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            match_metrics,
            rating_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get match metrics
    pub fn matches(&self) -> &MatchMetrics {
        &self.match_metrics
    }

    /// Get rating metrics
    pub fn rating(&self) -> &RatingMetrics {
        &self.rating_metrics
    }

    /// Get performance metrics
    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record a match applied to player ratings
    pub fn record_match_processed(&self, result: &MatchProcessingResult, duration: Duration) {
        self.match_metrics
            .matches_processed_total
            .with_label_values(&[result.format()])
            .inc();

        self.match_metrics
            .pairings_rated_total
            .inc_by(result.pairings.len() as u64);

        self.match_metrics
            .players_skipped_total
            .inc_by(result.skipped_players.len() as u64);

        for entry in &result.history {
            let outcome = if entry.is_winner { "win" } else { "loss" };
            self.rating_metrics
                .rating_change
                .with_label_values(&[outcome])
                .observe(entry.rating_change as f64);
        }

        self.performance_metrics
            .match_processing_duration
            .observe(duration.as_secs_f64());
    }

    /// Record a rejected match report
    pub fn record_match_rejected(&self, error_kind: &str, duration: Duration) {
        self.match_metrics
            .matches_rejected_total
            .with_label_values(&[error_kind])
            .inc();

        self.performance_metrics
            .match_processing_duration
            .observe(duration.as_secs_f64());
    }

    /// Refresh rating gauges from the current player set
    pub fn update_from_players(&self, players: &[PlayerRecord]) {
        self.rating_metrics
            .registered_players
            .set(players.len() as i64);

        let (average, highest) = if players.is_empty() {
            (0.0, 0.0)
        } else {
            let total: f64 = players.iter().map(|p| p.rating).sum();
            let highest = players
                .iter()
                .map(|p| p.rating)
                .fold(f64::MIN, f64::max);
            (total / players.len() as f64, highest)
        };
        self.rating_metrics.average_rating.set(average);
        self.rating_metrics.highest_rating.set(highest);

        let on_streak = players
            .iter()
            .filter(|p| p.streak_count.unwrap_or(0) > 0)
            .count();
        self.rating_metrics.players_on_streak.set(on_streak as i64);
    }

    /// Record rating calculation duration
    pub fn record_rating_calculation(&self, duration: Duration) {
        self.performance_metrics
            .rating_calculation_duration
            .observe(duration.as_secs_f64());
    }

    /// Record AMQP operation
    pub fn record_amqp_operation(&self, operation: &str, success: bool, duration: Duration) {
        let status = if success { "success" } else { "error" };

        self.service_metrics
            .amqp_messages_total
            .with_label_values(&[operation, status])
            .inc();

        if !success {
            self.service_metrics
                .amqp_errors_total
                .with_label_values(&[operation])
                .inc();
        }

        self.performance_metrics
            .amqp_operation_duration
            .with_label_values(&[operation, status])
            .observe(duration.as_secs_f64());
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("club_ratings_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let amqp_messages_total = IntCounterVec::new(
            Opts::new(
                "club_ratings_amqp_messages_total",
                "Total AMQP messages processed",
            ),
            &["operation", "status"],
        )?;
        registry.register(Box::new(amqp_messages_total.clone()))?;

        let amqp_errors_total = IntCounterVec::new(
            Opts::new("club_ratings_amqp_errors_total", "Total AMQP errors"),
            &["operation"],
        )?;
        registry.register(Box::new(amqp_errors_total.clone()))?;

        let health_status = IntGauge::new(
            "club_ratings_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("club_ratings_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            amqp_messages_total,
            amqp_errors_total,
            health_status,
            component_health,
        })
    }
}

impl MatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let matches_processed_total = IntCounterVec::new(
            Opts::new(
                "club_ratings_matches_processed_total",
                "Matches applied to player ratings",
            ),
            &["format"],
        )?;
        registry.register(Box::new(matches_processed_total.clone()))?;

        let matches_rejected_total = IntCounterVec::new(
            Opts::new(
                "club_ratings_matches_rejected_total",
                "Match reports rejected",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(matches_rejected_total.clone()))?;

        let pairings_rated_total = IntCounter::new(
            "club_ratings_pairings_rated_total",
            "Winner/loser pairings rated",
        )?;
        registry.register(Box::new(pairings_rated_total.clone()))?;

        let players_skipped_total = IntCounter::new(
            "club_ratings_players_skipped_total",
            "Unknown players skipped while processing matches",
        )?;
        registry.register(Box::new(players_skipped_total.clone()))?;

        Ok(Self {
            matches_processed_total,
            matches_rejected_total,
            pairings_rated_total,
            players_skipped_total,
        })
    }
}

impl RatingMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let rating_change = HistogramVec::new(
            HistogramOpts::new(
                "club_ratings_rating_change",
                "Rating change per player and match",
            )
            .buckets(vec![
                -60.0, -40.0, -20.0, -10.0, -5.0, 0.0, 5.0, 10.0, 20.0, 40.0, 60.0,
            ]),
            &["outcome"],
        )?;
        registry.register(Box::new(rating_change.clone()))?;

        let registered_players = IntGauge::new(
            "club_ratings_registered_players",
            "Number of registered players",
        )?;
        registry.register(Box::new(registered_players.clone()))?;

        let average_rating =
            Gauge::new("club_ratings_average_rating", "Mean rating over all players")?;
        registry.register(Box::new(average_rating.clone()))?;

        let highest_rating =
            Gauge::new("club_ratings_highest_rating", "Highest rating of any player")?;
        registry.register(Box::new(highest_rating.clone()))?;

        let players_on_streak = IntGauge::new(
            "club_ratings_players_on_streak",
            "Players with an active significant-win streak",
        )?;
        registry.register(Box::new(players_on_streak.clone()))?;

        Ok(Self {
            rating_change,
            registered_players,
            average_rating,
            highest_rating,
            players_on_streak,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let match_processing_duration = Histogram::with_opts(
            HistogramOpts::new(
                "club_ratings_match_processing_duration_seconds",
                "Match processing time",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(match_processing_duration.clone()))?;

        let rating_calculation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "club_ratings_rating_calculation_duration_seconds",
                "Rating calculation time",
            )
            .buckets(vec![0.00001, 0.0001, 0.001, 0.005, 0.01]),
        )?;
        registry.register(Box::new(rating_calculation_duration.clone()))?;

        let amqp_operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "club_ratings_amqp_operation_duration_seconds",
                "AMQP operation duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation", "status"],
        )?;
        registry.register(Box::new(amqp_operation_duration.clone()))?;

        Ok(Self {
            match_processing_duration,
            rating_calculation_duration,
            amqp_operation_duration,
        })
    }
}
