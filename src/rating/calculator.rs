//! Rating calculator trait and implementations
//!
//! This module defines the interface the match processor uses to rate a
//! winner/loser pairing, the production implementation backed by
//! [`RatingEngine`], and a recording mock for tests.

use crate::config::rating::RatingConfig;
use crate::error::{RatingError, Result};
use crate::rating::engine::RatingEngine;
use crate::types::{MatchOutcome, PairRatingUpdate, PlayerRatingState, RatingUpdateResult};

/// Trait for calculating rating changes after a match
pub trait RatingCalculator: Send + Sync {
    /// Rate a single winner/loser pairing
    ///
    /// # Arguments
    /// * `winner` / `loser` - pre-match snapshots
    /// * `outcome` - final score, winner first
    /// * `days_inactive_winner` / `days_inactive_loser` - whole days since each last played
    fn calculate_pair(
        &self,
        winner: &PlayerRatingState,
        loser: &PlayerRatingState,
        outcome: MatchOutcome,
        days_inactive_winner: u32,
        days_inactive_loser: u32,
    ) -> Result<PairRatingUpdate>;

    /// Get the initial rating for new players
    fn initial_rating(&self) -> f64;

    /// Active rating parameters
    fn rating_config(&self) -> RatingConfig;

    /// Get current configuration as JSON
    fn config(&self) -> serde_json::Value;

    /// Update configuration from JSON
    fn update_config(&mut self, config: serde_json::Value) -> Result<()>;
}

/// Production calculator using the club rating formula
#[derive(Debug, Clone, Default)]
pub struct ClubRatingCalculator {
    engine: RatingEngine,
}

impl ClubRatingCalculator {
    pub fn new(config: RatingConfig) -> Result<Self> {
        Ok(Self {
            engine: RatingEngine::new(config)?,
        })
    }

    pub fn engine(&self) -> &RatingEngine {
        &self.engine
    }
}

impl RatingCalculator for ClubRatingCalculator {
    fn calculate_pair(
        &self,
        winner: &PlayerRatingState,
        loser: &PlayerRatingState,
        outcome: MatchOutcome,
        days_inactive_winner: u32,
        days_inactive_loser: u32,
    ) -> Result<PairRatingUpdate> {
        if !winner.rating.is_finite() || !loser.rating.is_finite() {
            return Err(RatingError::RatingCalculationFailed {
                reason: format!(
                    "Non-finite rating for pairing {} vs {}",
                    winner.id, loser.id
                ),
            }
            .into());
        }

        Ok(self.engine.update_ratings(
            winner,
            loser,
            outcome,
            days_inactive_winner,
            days_inactive_loser,
        ))
    }

    fn initial_rating(&self) -> f64 {
        self.engine.config().baseline
    }

    fn rating_config(&self) -> RatingConfig {
        self.engine.config().clone()
    }

    fn config(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self.engine.config()).unwrap_or_default();
        if let Some(map) = value.as_object_mut() {
            map.insert("type".to_string(), serde_json::json!("club"));
        }
        value
    }

    fn update_config(&mut self, config: serde_json::Value) -> Result<()> {
        // Merge the given keys over the current configuration
        let mut merged = serde_json::to_value(self.engine.config()).map_err(|e| {
            RatingError::ConfigurationError {
                message: format!("Failed to serialize rating config: {}", e),
            }
        })?;
        if let (Some(target), Some(updates)) = (merged.as_object_mut(), config.as_object()) {
            for (key, value) in updates {
                if key != "type" {
                    target.insert(key.clone(), value.clone());
                }
            }
        }

        let new_config: RatingConfig =
            serde_json::from_value(merged).map_err(|e| RatingError::ConfigurationError {
                message: format!("Invalid rating config: {}", e),
            })?;
        self.engine = RatingEngine::new(new_config)?;
        Ok(())
    }
}

/// Mock rating calculator for testing
#[derive(Debug, Default)]
pub struct MockRatingCalculator {
    calculation_calls: std::sync::Mutex<Vec<(PlayerRatingState, PlayerRatingState, MatchOutcome)>>,
    fixed_result: std::sync::RwLock<Option<PairRatingUpdate>>,
    config: RatingConfig,
}

impl MockRatingCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a fixed result to return for all calculations
    pub fn set_fixed_result(&self, result: PairRatingUpdate) {
        if let Ok(mut fixed) = self.fixed_result.write() {
            *fixed = Some(result);
        }
    }

    /// Get all calculation calls made (for testing)
    pub fn get_calculation_calls(&self) -> Vec<(PlayerRatingState, PlayerRatingState, MatchOutcome)> {
        self.calculation_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Clear recorded calls
    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.calculation_calls.lock() {
            calls.clear();
        }
    }
}

impl RatingCalculator for MockRatingCalculator {
    fn calculate_pair(
        &self,
        winner: &PlayerRatingState,
        loser: &PlayerRatingState,
        outcome: MatchOutcome,
        _days_inactive_winner: u32,
        _days_inactive_loser: u32,
    ) -> Result<PairRatingUpdate> {
        if let Ok(mut calls) = self.calculation_calls.lock() {
            calls.push((winner.clone(), loser.clone(), outcome));
        }

        if let Ok(fixed) = self.fixed_result.read() {
            if let Some(result) = fixed.as_ref() {
                return Ok(*result);
            }
        }

        // Default behavior: no rating change
        Ok(PairRatingUpdate {
            winner: RatingUpdateResult {
                new_rating: winner.rating.round() as i64,
                rating_change: 0,
            },
            loser: RatingUpdateResult {
                new_rating: loser.rating.round() as i64,
                rating_change: 0,
            },
        })
    }

    fn initial_rating(&self) -> f64 {
        self.config.baseline
    }

    fn rating_config(&self) -> RatingConfig {
        self.config.clone()
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "mock",
            "baseline": self.config.baseline,
        })
    }

    fn update_config(&mut self, config: serde_json::Value) -> Result<()> {
        if let Some(baseline) = config.get("baseline").and_then(|v| v.as_f64()) {
            self.config.baseline = baseline;
        }
        Ok(())
    }
}
