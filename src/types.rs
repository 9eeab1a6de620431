//! Common types used throughout the rating service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for club players
pub type PlayerId = String;

/// Unique identifier for logged matches
pub type MatchId = Uuid;

/// Snapshot of the rating-relevant state of a player
///
/// The engine only ever reads a snapshot and hands back new values; the
/// persisted record is owned by storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRatingState {
    pub id: PlayerId,
    pub rating: f64,
    /// Consecutive significant wins, `None` for players that never had one recorded
    pub streak_count: Option<u32>,
    pub last_played_at: Option<DateTime<Utc>>,
}

impl PlayerRatingState {
    /// Create a snapshot with no streak and no previous match
    pub fn new(id: impl Into<PlayerId>, rating: f64) -> Self {
        Self {
            id: id.into(),
            rating,
            streak_count: None,
            last_played_at: None,
        }
    }

    pub fn with_streak(mut self, streak_count: u32) -> Self {
        self.streak_count = Some(streak_count);
        self
    }

    pub fn with_last_played(mut self, last_played_at: DateTime<Utc>) -> Self {
        self.last_played_at = Some(last_played_at);
        self
    }

    /// Streak count with a missing value read as zero
    pub fn streak(&self) -> u32 {
        self.streak_count.unwrap_or(0)
    }
}

/// Final score of a decided match, seen from the winning side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub winner_score: u32,
    pub loser_score: u32,
}

impl MatchOutcome {
    pub fn new(winner_score: u32, loser_score: u32) -> Self {
        Self {
            winner_score,
            loser_score,
        }
    }

    /// Points separating winner and loser (negative if the invariant is broken)
    pub fn score_difference(&self) -> i64 {
        self.winner_score as i64 - self.loser_score as i64
    }
}

/// Rounded rating result for one side of a pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingUpdateResult {
    pub new_rating: i64,
    pub rating_change: i64,
}

/// Engine output for a single winner/loser pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairRatingUpdate {
    pub winner: RatingUpdateResult,
    pub loser: RatingUpdateResult,
}

/// Side of a logged match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeamSide {
    A,
    B,
}

impl TeamSide {
    pub fn opponent(self) -> Self {
        match self {
            TeamSide::A => TeamSide::B,
            TeamSide::B => TeamSide::A,
        }
    }
}

impl std::fmt::Display for TeamSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TeamSide::A => write!(f, "team_a"),
            TeamSide::B => write!(f, "team_b"),
        }
    }
}

/// Inbound report of a completed singles or doubles match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchReport {
    pub match_id: MatchId,
    pub team_a: Vec<PlayerId>,
    pub team_b: Vec<PlayerId>,
    pub team_a_score: u32,
    pub team_b_score: u32,
    /// When the match was played; processing time is used when absent
    #[serde(default)]
    pub played_at: Option<DateTime<Utc>>,
}

impl MatchReport {
    /// Side with the higher score, `None` for a tie
    pub fn winning_side(&self) -> Option<TeamSide> {
        match self.team_a_score.cmp(&self.team_b_score) {
            std::cmp::Ordering::Greater => Some(TeamSide::A),
            std::cmp::Ordering::Less => Some(TeamSide::B),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn team(&self, side: TeamSide) -> &[PlayerId] {
        match side {
            TeamSide::A => &self.team_a,
            TeamSide::B => &self.team_b,
        }
    }

    pub fn score(&self, side: TeamSide) -> u32 {
        match side {
            TeamSide::A => self.team_a_score,
            TeamSide::B => self.team_b_score,
        }
    }

    /// All participants, team A first
    pub fn participants(&self) -> Vec<PlayerId> {
        self.team_a
            .iter()
            .chain(self.team_b.iter())
            .cloned()
            .collect()
    }
}

/// A processed match as kept by storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: MatchId,
    pub team_a: Vec<PlayerId>,
    pub team_b: Vec<PlayerId>,
    pub team_a_score: u32,
    pub team_b_score: u32,
    pub winner: TeamSide,
    pub played_at: DateTime<Utc>,
}

impl MatchRecord {
    pub fn team(&self, side: TeamSide) -> &[PlayerId] {
        match side {
            TeamSide::A => &self.team_a,
            TeamSide::B => &self.team_b,
        }
    }

    pub fn winners(&self) -> &[PlayerId] {
        self.team(self.winner)
    }

    pub fn losers(&self) -> &[PlayerId] {
        self.team(self.winner.opponent())
    }

    pub fn is_singles(&self) -> bool {
        self.team_a.len() == 1 && self.team_b.len() == 1
    }

    pub fn is_doubles(&self) -> bool {
        self.team_a.len() == 2 && self.team_b.len() == 2
    }

    /// Absolute score difference between the two sides
    pub fn score_difference(&self) -> u32 {
        self.team_a_score.abs_diff(self.team_b_score)
    }
}

/// One row of a player's rating history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchHistoryEntry {
    pub player_id: PlayerId,
    pub match_id: MatchId,
    pub rating_before: f64,
    pub rating_after: f64,
    pub rating_change: i64,
    pub is_winner: bool,
    /// Own score minus opponent score, negative for losers
    pub score_difference: i64,
    pub date: DateTime<Utc>,
}

/// New persisted values for a player after a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerUpdate {
    pub id: PlayerId,
    pub rating: f64,
    pub streak_count: u32,
    pub last_played_at: DateTime<Utc>,
    pub matches_played: u64,
    pub wins: u64,
}

/// Event emitted after a match has been applied to player ratings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingsUpdated {
    pub match_id: MatchId,
    pub player_updates: Vec<PlayerUpdate>,
    pub match_history: Vec<MatchHistoryEntry>,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a match report could not be applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRejected {
    pub match_id: Option<MatchId>,
    pub reason: String,
    pub error_kind: String,
    pub timestamp: DateTime<Utc>,
}
