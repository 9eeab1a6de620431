//! Per-player summary built from the stored record and rating history

use crate::rating::inactivity::days_inactive_now;
use crate::rating::storage::PlayerRecord;
use crate::types::{MatchHistoryEntry, PlayerId};
use crate::utils::ratio;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub player_id: PlayerId,
    pub name: String,
    pub rating: f64,
    pub matches_played: u64,
    pub wins: u64,
    pub losses: u64,
    pub win_rate: f64,
    /// Highest rating reached, including the starting rating
    pub peak_rating: f64,
    pub current_streak: u32,
    /// Net rating change over the recorded history
    pub total_rating_change: i64,
    /// Whole days since the last match, as the activity adjustment sees it
    pub days_inactive: u32,
}

/// Summarise a player from their record and history rows
pub fn player_summary(record: &PlayerRecord, history: &[MatchHistoryEntry]) -> PlayerSummary {
    let peak_rating = history
        .iter()
        .flat_map(|entry| [entry.rating_before, entry.rating_after])
        .fold(record.rating, f64::max);

    PlayerSummary {
        player_id: record.id.clone(),
        name: record.name.clone(),
        rating: record.rating,
        matches_played: record.matches_played,
        wins: record.wins,
        losses: record.matches_played.saturating_sub(record.wins),
        win_rate: ratio(record.wins, record.matches_played),
        peak_rating,
        current_streak: record.streak_count.unwrap_or(0),
        total_rating_change: history.iter().map(|entry| entry.rating_change).sum(),
        days_inactive: days_inactive_now(record.last_played_at),
    }
}
