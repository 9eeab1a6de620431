//! Match processor applying validated reports to player ratings
//!
//! The processor owns the read-modify-write cycle for a match: it loads the
//! participants, rates every winner/loser pairing, aggregates the results per
//! player and persists the new values, the match record and history rows.

use crate::config::app::ProcessingSettings;
use crate::error::{error_kind, RatingError, Result};
use crate::processing::aggregator::RatingAggregator;
use crate::processing::validation::validate_match_report;
use crate::rating::calculator::RatingCalculator;
use crate::rating::engine::RatingEngine;
use crate::rating::inactivity::days_inactive;
use crate::rating::storage::{PlayerRecord, PlayerStorage};
use crate::types::{
    MatchHistoryEntry, MatchId, MatchOutcome, MatchRecord, MatchReport, PairRatingUpdate,
    PlayerId, PlayerUpdate, RatingsUpdated, TeamSide,
};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Statistics about processor operations
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ProcessorStats {
    /// Matches applied to player ratings
    pub matches_processed: u64,
    /// Reports rejected by validation or processing
    pub matches_rejected: u64,
    /// Winner/loser pairings rated
    pub pairings_rated: u64,
    /// Player records updated
    pub players_updated: u64,
    /// Players left out because no record existed
    pub players_skipped: u64,
}

/// Outcome of applying one match report
#[derive(Debug, Clone)]
pub struct MatchProcessingResult {
    pub match_id: MatchId,
    pub winner: TeamSide,
    pub player_updates: Vec<PlayerUpdate>,
    pub history: Vec<MatchHistoryEntry>,
    /// Raw engine output per winner/loser pairing
    pub pairings: Vec<PairRatingUpdate>,
    pub skipped_players: Vec<PlayerId>,
    pub processed_at: DateTime<Utc>,
    /// Time spent rating the pairings
    pub calculation_time: Duration,
}

impl MatchProcessingResult {
    /// Event announcing the new ratings
    pub fn to_event(&self) -> RatingsUpdated {
        RatingsUpdated {
            match_id: self.match_id,
            player_updates: self.player_updates.clone(),
            match_history: self.history.clone(),
            timestamp: self.processed_at,
        }
    }

    /// Update for a single player, if it took part
    pub fn update_for(&self, player_id: &str) -> Option<&PlayerUpdate> {
        self.player_updates.iter().find(|u| u.id == player_id)
    }

    /// "singles", "doubles" or "mixed" (one against two), by rated pairings
    pub fn format(&self) -> &'static str {
        match self.pairings.len() {
            1 => "singles",
            4 => "doubles",
            _ => "mixed",
        }
    }
}

/// Applies match reports to stored player ratings
#[derive(Clone)]
pub struct MatchProcessor {
    /// Rating calculator for winner/loser pairings
    calculator: Arc<dyn RatingCalculator>,
    /// Player, match and history storage
    storage: Arc<dyn PlayerStorage>,
    settings: ProcessingSettings,
    /// Serialises the load, compute and persist cycle across matches
    write_guard: Arc<Mutex<()>>,
    stats: Arc<RwLock<ProcessorStats>>,
}

impl MatchProcessor {
    /// Create a new processor
    pub fn new(
        calculator: Arc<dyn RatingCalculator>,
        storage: Arc<dyn PlayerStorage>,
        settings: ProcessingSettings,
    ) -> Self {
        Self {
            calculator,
            storage,
            settings,
            write_guard: Arc::new(Mutex::new(())),
            stats: Arc::new(RwLock::new(ProcessorStats::default())),
        }
    }

    pub fn storage(&self) -> &Arc<dyn PlayerStorage> {
        &self.storage
    }

    pub fn calculator(&self) -> &Arc<dyn RatingCalculator> {
        &self.calculator
    }

    pub fn settings(&self) -> &ProcessingSettings {
        &self.settings
    }

    /// Validate and apply a match report
    pub async fn process_match(&self, report: MatchReport) -> Result<MatchProcessingResult> {
        let start_time = Instant::now();
        let match_id = report.match_id;

        info!(
            "Processing match {} - team_a: {:?}, team_b: {:?}, score: {}-{}",
            match_id, report.team_a, report.team_b, report.team_a_score, report.team_b_score
        );

        let result = self.apply_match(report).await;
        let duration = start_time.elapsed();

        {
            let mut stats = self
                .stats
                .write()
                .map_err(|_| RatingError::InternalError {
                    message: "Failed to acquire stats lock".to_string(),
                })?;

            match &result {
                Ok(processed) => {
                    stats.matches_processed += 1;
                    stats.pairings_rated += processed.pairings.len() as u64;
                    stats.players_updated += processed.player_updates.len() as u64;
                    stats.players_skipped += processed.skipped_players.len() as u64;
                }
                Err(_) => stats.matches_rejected += 1,
            }
        }

        match &result {
            Ok(processed) => info!(
                "Match {} processed in {:.2}ms - {} players updated, winner: {}",
                match_id,
                duration.as_secs_f64() * 1000.0,
                processed.player_updates.len(),
                processed.winner
            ),
            Err(e) => warn!(
                "Match {} rejected ({}) after {:.2}ms: {}",
                match_id,
                error_kind(e),
                duration.as_secs_f64() * 1000.0,
                e
            ),
        }

        result
    }

    /// Process reports one after another, keeping each report's result
    pub async fn process_batch(
        &self,
        reports: Vec<MatchReport>,
    ) -> Vec<Result<MatchProcessingResult>> {
        let mut results = Vec::with_capacity(reports.len());
        for report in reports {
            results.push(self.process_match(report).await);
        }
        results
    }

    /// Get current processor statistics
    pub fn stats(&self) -> Result<ProcessorStats> {
        let stats = self
            .stats
            .read()
            .map_err(|_| RatingError::InternalError {
                message: "Failed to acquire stats lock".to_string(),
            })?;

        Ok(stats.clone())
    }

    async fn apply_match(&self, report: MatchReport) -> Result<MatchProcessingResult> {
        let winner_side = validate_match_report(&report, self.settings.max_score)?;
        let loser_side = winner_side.opponent();

        let _guard = self.write_guard.lock().await;
        if self.storage.has_match(&report.match_id)? {
            return Err(RatingError::InvalidMatchReport {
                reason: format!("match {} was already processed", report.match_id),
            }
            .into());
        }

        let processed_at = current_timestamp();
        let played_at = report.played_at.unwrap_or(processed_at);

        let records = self.storage.get_players(&report.participants())?;
        let mut skipped_players = Vec::new();
        let winners = self.resolve_team(report.team(winner_side), &records, &mut skipped_players)?;
        let losers = self.resolve_team(report.team(loser_side), &records, &mut skipped_players)?;

        if winners.is_empty() || losers.is_empty() {
            return Err(RatingError::InvalidMatchReport {
                reason: format!(
                    "no rated players left on {} after skipping {:?}",
                    if winners.is_empty() { winner_side } else { loser_side },
                    skipped_players
                ),
            }
            .into());
        }

        // Inactivity comes from the pre-match snapshot and is computed once per player
        let days: HashMap<&str, u32> = winners
            .iter()
            .chain(losers.iter())
            .map(|record| {
                (
                    record.id.as_str(),
                    days_inactive(record.last_played_at, processed_at),
                )
            })
            .collect();

        let outcome = MatchOutcome::new(report.score(winner_side), report.score(loser_side));
        let rating_config = self.calculator.rating_config();
        let mut aggregator = RatingAggregator::new(rating_config.min_rating);
        let mut pairings = Vec::with_capacity(winners.len() * losers.len());
        let calculation_start = Instant::now();

        for winner in &winners {
            let winner_state = winner.rating_state();
            for loser in &losers {
                let loser_state = loser.rating_state();
                let update = self.calculator.calculate_pair(
                    &winner_state,
                    &loser_state,
                    outcome,
                    days[winner.id.as_str()],
                    days[loser.id.as_str()],
                )?;

                debug!(
                    "Pairing {} vs {}: {:+} / {:+}",
                    winner.id, loser.id, update.winner.rating_change, update.loser.rating_change
                );

                aggregator.add_pair(&winner_state, &loser_state, &update);
                pairings.push(update);
            }
        }
        let calculation_time = calculation_start.elapsed();

        let engine = RatingEngine::new(rating_config)?;
        let by_id: HashMap<&str, &PlayerRecord> = winners
            .iter()
            .chain(losers.iter())
            .map(|record| (record.id.as_str(), *record))
            .collect();

        let mut player_updates = Vec::new();
        let mut history = Vec::new();
        let mut updated_records = Vec::new();

        for change in aggregator.finish() {
            let Some(record) = by_id.get(change.player_id.as_str()) else {
                continue;
            };

            let streak_count = if change.is_winner {
                engine.next_winner_streak(record.streak_count, change.mean_change())
            } else {
                0
            };

            let update = PlayerUpdate {
                id: change.player_id.clone(),
                rating: change.rating_after,
                streak_count,
                last_played_at: processed_at,
                matches_played: record.matches_played + 1,
                wins: record.wins + u64::from(change.is_winner),
            };

            let score_difference = if change.is_winner {
                outcome.score_difference()
            } else {
                -outcome.score_difference()
            };

            history.push(MatchHistoryEntry {
                player_id: change.player_id.clone(),
                match_id: report.match_id,
                rating_before: change.rating_before,
                rating_after: change.rating_after,
                rating_change: change.rating_change,
                is_winner: change.is_winner,
                score_difference,
                date: played_at,
            });

            let mut updated = (*record).clone();
            updated.apply_update(&update);
            updated_records.push(updated);
            player_updates.push(update);
        }

        self.storage.commit_match(
            updated_records,
            MatchRecord {
                match_id: report.match_id,
                team_a: report.team_a.clone(),
                team_b: report.team_b.clone(),
                team_a_score: report.team_a_score,
                team_b_score: report.team_b_score,
                winner: winner_side,
                played_at,
            },
            history.clone(),
        )?;

        Ok(MatchProcessingResult {
            match_id: report.match_id,
            winner: winner_side,
            player_updates,
            history,
            pairings,
            skipped_players,
            processed_at,
            calculation_time,
        })
    }

    /// Look up the records for one team, failing or skipping missing players
    fn resolve_team<'a>(
        &self,
        team: &[PlayerId],
        records: &'a HashMap<PlayerId, PlayerRecord>,
        skipped: &mut Vec<PlayerId>,
    ) -> Result<Vec<&'a PlayerRecord>> {
        let mut resolved = Vec::with_capacity(team.len());
        for player_id in team {
            match records.get(player_id) {
                Some(record) => resolved.push(record),
                None if self.settings.skip_missing_players => {
                    warn!("Skipping unknown player {} in match", player_id);
                    skipped.push(player_id.clone());
                }
                None => {
                    return Err(RatingError::PlayerNotFound {
                        player_id: player_id.clone(),
                    }
                    .into())
                }
            }
        }
        Ok(resolved)
    }
}
