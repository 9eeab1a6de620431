//! Rating system configuration

use crate::error::{RatingError, Result};
use serde::{Deserialize, Serialize};

/// Base sensitivity of a single match
pub const BASE_K: f64 = 24.0;
/// Inflation applied to recently active players, as a fraction of rating
pub const INFLATION_RATE: f64 = 0.0015;
/// Per-day decay once a player has been away for `DECAY_START_DAYS`
pub const DECAY_RATE: f64 = 0.003;
/// Days of inactivity before decay replaces inflation
pub const DECAY_START_DAYS: u32 = 15;
/// Rating assigned to newly registered players
pub const BASELINE: f64 = 1000.0;
/// Hard floor for any rating
pub const MIN_RATING: f64 = 800.0;
/// Score difference that counts as a full-margin win
pub const MARGIN_SCALE: f64 = 21.0;
/// Highest score accepted in a match report
pub const MAX_SCORE: u32 = 30;

/// Whose rating scales the activity adjustments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityBase {
    /// Both sides are scaled by the winner's pre-match rating
    #[default]
    Winner,
    /// Each side is scaled by its own pre-match rating
    OwnRating,
}

impl std::str::FromStr for ActivityBase {
    type Err = RatingError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "winner" => Ok(ActivityBase::Winner),
            "own_rating" | "own" => Ok(ActivityBase::OwnRating),
            other => Err(RatingError::ConfigurationError {
                message: format!("Unknown activity base: {}", other),
            }),
        }
    }
}

/// Tunable parameters of the rating engine
///
/// The defaults reproduce the club's published formula exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    pub base_k: f64,
    pub inflation_rate: f64,
    pub decay_rate: f64,
    pub decay_start_days: u32,
    pub baseline: f64,
    pub min_rating: f64,
    pub margin_scale: f64,
    /// Clamp the normalised margin to [0, 1] so blowouts cannot raise the loser
    pub clamp_margin: bool,
    pub activity_base: ActivityBase,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            base_k: BASE_K,
            inflation_rate: INFLATION_RATE,
            decay_rate: DECAY_RATE,
            decay_start_days: DECAY_START_DAYS,
            baseline: BASELINE,
            min_rating: MIN_RATING,
            margin_scale: MARGIN_SCALE,
            clamp_margin: false,
            activity_base: ActivityBase::Winner,
        }
    }
}

impl RatingConfig {
    /// Gain above which a win counts as significant for streaks
    pub fn significant_win_threshold(&self) -> f64 {
        self.base_k * 0.5
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.base_k <= 0.0 {
            return Err(RatingError::ConfigurationError {
                message: "Base K must be positive".to_string(),
            }
            .into());
        }

        if self.inflation_rate < 0.0 || self.decay_rate < 0.0 {
            return Err(RatingError::ConfigurationError {
                message: "Inflation and decay rates must be non-negative".to_string(),
            }
            .into());
        }

        if self.decay_start_days == 0 {
            return Err(RatingError::ConfigurationError {
                message: "Decay start days must be greater than 0".to_string(),
            }
            .into());
        }

        if self.margin_scale <= 0.0 {
            return Err(RatingError::ConfigurationError {
                message: "Margin scale must be positive".to_string(),
            }
            .into());
        }

        if self.min_rating > self.baseline {
            return Err(RatingError::ConfigurationError {
                message: format!(
                    "Minimum rating {} cannot exceed baseline {}",
                    self.min_rating, self.baseline
                ),
            }
            .into());
        }

        Ok(())
    }
}
