//! Club rating engine
//!
//! Computes post-match ratings for one winner/loser pairing. The update has a
//! zero-sum performance part (an Elo-style expectation scaled by the score
//! margin) and a non-zero-sum activity part that inflates recently active
//! players and decays players who have been away.
//!
//! Everything here is pure: no I/O, no shared state, O(1) per pairing.

use crate::config::rating::{ActivityBase, RatingConfig};
use crate::error::Result;
use crate::types::{MatchOutcome, PairRatingUpdate, PlayerRatingState, RatingUpdateResult};
use crate::utils::round_half_up;
use skillratings::elo::{expected_score, EloRating};

/// Zero-sum part of a rating update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceAdjustment {
    /// Normalised score dominance, `(winner - loser) / margin_scale`
    pub margin: f64,
    /// Expected win probability of the winner before the match
    pub expected_win: f64,
    pub winner_gain: f64,
    /// Amount taken from the loser; negative for blowouts past the margin scale
    pub loser_loss: f64,
}

/// Rating engine parameterised by a validated [`RatingConfig`]
#[derive(Debug, Clone, Default)]
pub struct RatingEngine {
    config: RatingConfig,
}

impl RatingEngine {
    /// Create an engine, rejecting invalid configuration
    pub fn new(config: RatingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RatingConfig {
        &self.config
    }

    /// Logistic expectation that `winner_rating` beats `loser_rating`
    pub fn expected_win(winner_rating: f64, loser_rating: f64) -> f64 {
        let (expected, _) = expected_score(
            &EloRating {
                rating: winner_rating,
            },
            &EloRating {
                rating: loser_rating,
            },
        );
        expected
    }

    /// Normalised score dominance of an outcome
    pub fn margin(&self, outcome: MatchOutcome) -> f64 {
        let margin = outcome.score_difference() as f64 / self.config.margin_scale;
        if self.config.clamp_margin {
            margin.clamp(0.0, 1.0)
        } else {
            margin
        }
    }

    /// Performance adjustment for a pairing
    pub fn performance(
        &self,
        winner_rating: f64,
        loser_rating: f64,
        outcome: MatchOutcome,
    ) -> PerformanceAdjustment {
        let margin = self.margin(outcome);
        let expected_win = Self::expected_win(winner_rating, loser_rating);

        // Dominant wins pay up to three times the base gain
        let winner_gain = self.config.base_k * (1.0 - expected_win) * (1.0 + margin * 2.0);
        let loser_loss = self.config.base_k * expected_win * (1.0 - margin);

        PerformanceAdjustment {
            margin,
            expected_win,
            winner_gain,
            loser_loss,
        }
    }

    /// Inflation for a player who played within the decay window
    pub fn inflation(&self, days_inactive: u32, base_rating: f64) -> f64 {
        let start = self.config.decay_start_days;
        let active_days = start.saturating_sub(days_inactive) as f64;
        self.config.inflation_rate * (active_days / start as f64) * base_rating
    }

    /// Linear decay for every day past the decay window
    pub fn decay(&self, days_inactive: u32, base_rating: f64) -> f64 {
        let idle_days = days_inactive.saturating_sub(self.config.decay_start_days) as f64;
        self.config.decay_rate * idle_days * base_rating
    }

    /// Net activity adjustment (inflation minus decay)
    pub fn activity_adjustment(&self, days_inactive: u32, base_rating: f64) -> f64 {
        self.inflation(days_inactive, base_rating) - self.decay(days_inactive, base_rating)
    }

    /// Bonus for extending a streak of significant wins
    ///
    /// Requires a significant gain and an existing streak of at least two.
    pub fn streak_bonus(&self, winner_gain: f64, streak_count: Option<u32>) -> f64 {
        match streak_count {
            Some(streak) if winner_gain > self.config.significant_win_threshold() && streak >= 2 => {
                self.config.base_k * 0.1 * (streak + 1) as f64
            }
            _ => 0.0,
        }
    }

    /// Compute new ratings for a winner/loser pairing
    ///
    /// Scores must already satisfy `winner_score > loser_score`; the engine
    /// performs no validation and never fails.
    pub fn update_ratings(
        &self,
        winner: &PlayerRatingState,
        loser: &PlayerRatingState,
        outcome: MatchOutcome,
        days_inactive_winner: u32,
        days_inactive_loser: u32,
    ) -> PairRatingUpdate {
        let performance = self.performance(winner.rating, loser.rating, outcome);

        let (winner_base, loser_base) = match self.config.activity_base {
            ActivityBase::Winner => (winner.rating, winner.rating),
            ActivityBase::OwnRating => (winner.rating, loser.rating),
        };

        let winner_change =
            performance.winner_gain + self.activity_adjustment(days_inactive_winner, winner_base);
        let loser_change =
            -performance.loser_loss + self.activity_adjustment(days_inactive_loser, loser_base);

        let min_rating = self.config.min_rating;
        let mut new_winner_rating = (winner.rating + winner_change).max(min_rating);
        let new_loser_rating = (loser.rating + loser_change).max(min_rating);

        let streak_bonus = self.streak_bonus(performance.winner_gain, winner.streak_count);
        new_winner_rating += streak_bonus;

        PairRatingUpdate {
            winner: RatingUpdateResult {
                new_rating: round_half_up(new_winner_rating),
                rating_change: round_half_up(winner_change + streak_bonus),
            },
            loser: RatingUpdateResult {
                new_rating: round_half_up(new_loser_rating),
                rating_change: round_half_up(loser_change),
            },
        }
    }

    /// New streak count for a winner given the rounded change it received
    pub fn next_winner_streak(&self, previous: Option<u32>, rating_change: f64) -> u32 {
        if rating_change > self.config.significant_win_threshold() {
            previous.unwrap_or(0) + 1
        } else {
            0
        }
    }
}

/// Compute new ratings with the default club parameters
pub fn update_ratings(
    winner: &PlayerRatingState,
    loser: &PlayerRatingState,
    winner_score: u32,
    loser_score: u32,
    days_inactive_winner: u32,
    days_inactive_loser: u32,
) -> PairRatingUpdate {
    RatingEngine::default().update_ratings(
        winner,
        loser,
        MatchOutcome::new(winner_score, loser_score),
        days_inactive_winner,
        days_inactive_loser,
    )
}
