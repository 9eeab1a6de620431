//! Player storage interface and implementations
//!
//! This module defines the interface for persisting player records, processed
//! matches and per-player rating history, with in-memory and mock
//! implementations.

use crate::config::rating::BASELINE;
use crate::error::{RatingError, Result};
use crate::types::{
    MatchHistoryEntry, MatchId, MatchRecord, PlayerId, PlayerRatingState, PlayerUpdate,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Persisted player with rating and activity metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub name: String,
    pub rating: f64,
    pub streak_count: Option<u32>,
    pub last_played_at: Option<DateTime<Utc>>,
    pub matches_played: u64,
    pub wins: u64,
    pub created_at: DateTime<Utc>,
}

impl PlayerRecord {
    /// Create a new player at the given rating
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>, rating: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rating,
            streak_count: None,
            last_played_at: None,
            matches_played: 0,
            wins: 0,
            created_at: Utc::now(),
        }
    }

    /// Snapshot handed to the rating engine
    pub fn rating_state(&self) -> PlayerRatingState {
        PlayerRatingState {
            id: self.id.clone(),
            rating: self.rating,
            streak_count: self.streak_count,
            last_played_at: self.last_played_at,
        }
    }

    /// Apply post-match values
    pub fn apply_update(&mut self, update: &PlayerUpdate) {
        self.rating = update.rating;
        self.streak_count = Some(update.streak_count);
        self.last_played_at = Some(update.last_played_at);
        self.matches_played = update.matches_played;
        self.wins = update.wins;
    }
}

/// Trait for player storage operations
pub trait PlayerStorage: Send + Sync {
    /// Get a player record
    fn get_player(&self, player_id: &PlayerId) -> Result<Option<PlayerRecord>>;

    /// Get records for multiple players; missing ids are absent from the map
    fn get_players(&self, player_ids: &[PlayerId]) -> Result<HashMap<PlayerId, PlayerRecord>>;

    /// Store or replace a player record
    fn store_player(&self, record: PlayerRecord) -> Result<()>;

    /// Store multiple records at once
    fn store_players(&self, records: Vec<PlayerRecord>) -> Result<()>;

    /// Create a player at the baseline rating, failing if the id is taken
    fn register_player(&self, player_id: &PlayerId, name: &str) -> Result<PlayerRecord>;

    /// Get all players (for admin/debugging)
    fn get_all_players(&self) -> Result<HashMap<PlayerId, PlayerRecord>>;

    /// Remove a player, returning whether it existed
    fn remove_player(&self, player_id: &PlayerId) -> Result<bool>;

    /// Players ordered by rating, highest first
    fn leaderboard(&self, limit: Option<usize>) -> Result<Vec<PlayerRecord>>;

    /// Get total number of players
    fn player_count(&self) -> Result<usize>;

    /// Whether a match with this id was already committed
    fn has_match(&self, match_id: &MatchId) -> Result<bool>;

    /// Persist the outcome of one match in a single step
    ///
    /// Updated players, the match record and its history rows are written
    /// together; on error none of them are. A match id that was already
    /// committed is refused.
    fn commit_match(
        &self,
        players: Vec<PlayerRecord>,
        record: MatchRecord,
        history: Vec<MatchHistoryEntry>,
    ) -> Result<()>;

    /// All processed matches in the order they were recorded
    fn get_matches(&self) -> Result<Vec<MatchRecord>>;

    /// Rating history of a player, oldest first
    fn get_history(&self, player_id: &PlayerId) -> Result<Vec<MatchHistoryEntry>>;
}

fn read_lock<'a, T>(lock: &'a RwLock<T>, what: &str) -> Result<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| {
        RatingError::InternalError {
            message: format!("Failed to acquire {} read lock", what),
        }
        .into()
    })
}

fn write_lock<'a, T>(lock: &'a RwLock<T>, what: &str) -> Result<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| {
        RatingError::InternalError {
            message: format!("Failed to acquire {} write lock", what),
        }
        .into()
    })
}

fn sorted_by_rating(mut records: Vec<PlayerRecord>, limit: Option<usize>) -> Vec<PlayerRecord> {
    records.sort_by(|a, b| {
        b.rating
            .partial_cmp(&a.rating)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    if let Some(limit) = limit {
        records.truncate(limit);
    }
    records
}

/// Recorded matches with an id index
#[derive(Debug, Default)]
struct MatchLog {
    records: Vec<MatchRecord>,
    ids: HashSet<MatchId>,
}

/// In-memory player storage implementation
#[derive(Debug, Default)]
pub struct InMemoryPlayerStorage {
    players: RwLock<HashMap<PlayerId, PlayerRecord>>,
    matches: RwLock<MatchLog>,
    history: RwLock<Vec<MatchHistoryEntry>>,
}

impl InMemoryPlayerStorage {
    /// Create a new, empty in-memory storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage pre-populated with players
    pub fn with_players(records: Vec<PlayerRecord>) -> Self {
        let players = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();

        Self {
            players: RwLock::new(players),
            ..Self::default()
        }
    }
}

impl PlayerStorage for InMemoryPlayerStorage {
    fn get_player(&self, player_id: &PlayerId) -> Result<Option<PlayerRecord>> {
        let players = read_lock(&self.players, "players")?;
        Ok(players.get(player_id).cloned())
    }

    fn get_players(&self, player_ids: &[PlayerId]) -> Result<HashMap<PlayerId, PlayerRecord>> {
        let players = read_lock(&self.players, "players")?;

        let mut result = HashMap::new();
        for player_id in player_ids {
            if let Some(record) = players.get(player_id) {
                result.insert(player_id.clone(), record.clone());
            }
        }

        Ok(result)
    }

    fn store_player(&self, record: PlayerRecord) -> Result<()> {
        let mut players = write_lock(&self.players, "players")?;
        players.insert(record.id.clone(), record);
        Ok(())
    }

    fn store_players(&self, records: Vec<PlayerRecord>) -> Result<()> {
        let mut players = write_lock(&self.players, "players")?;
        for record in records {
            players.insert(record.id.clone(), record);
        }
        Ok(())
    }

    fn register_player(&self, player_id: &PlayerId, name: &str) -> Result<PlayerRecord> {
        let mut players = write_lock(&self.players, "players")?;

        if players.contains_key(player_id) {
            return Err(RatingError::StorageError {
                message: format!("Player already exists: {}", player_id),
            }
            .into());
        }

        let record = PlayerRecord::new(player_id.clone(), name, BASELINE);
        players.insert(player_id.clone(), record.clone());
        Ok(record)
    }

    fn get_all_players(&self) -> Result<HashMap<PlayerId, PlayerRecord>> {
        let players = read_lock(&self.players, "players")?;
        Ok(players.clone())
    }

    fn remove_player(&self, player_id: &PlayerId) -> Result<bool> {
        let mut players = write_lock(&self.players, "players")?;
        Ok(players.remove(player_id).is_some())
    }

    fn leaderboard(&self, limit: Option<usize>) -> Result<Vec<PlayerRecord>> {
        let players = read_lock(&self.players, "players")?;
        Ok(sorted_by_rating(players.values().cloned().collect(), limit))
    }

    fn player_count(&self) -> Result<usize> {
        let players = read_lock(&self.players, "players")?;
        Ok(players.len())
    }

    fn has_match(&self, match_id: &MatchId) -> Result<bool> {
        let matches = read_lock(&self.matches, "matches")?;
        Ok(matches.ids.contains(match_id))
    }

    fn commit_match(
        &self,
        players: Vec<PlayerRecord>,
        record: MatchRecord,
        history: Vec<MatchHistoryEntry>,
    ) -> Result<()> {
        // Locks are always taken in this order: players, matches, history
        let mut stored_players = write_lock(&self.players, "players")?;
        let mut matches = write_lock(&self.matches, "matches")?;
        let mut stored_history = write_lock(&self.history, "history")?;

        if matches.ids.contains(&record.match_id) {
            return Err(RatingError::StorageError {
                message: format!("Match already recorded: {}", record.match_id),
            }
            .into());
        }

        for player in players {
            stored_players.insert(player.id.clone(), player);
        }
        matches.ids.insert(record.match_id);
        matches.records.push(record);
        stored_history.extend(history);
        Ok(())
    }

    fn get_matches(&self) -> Result<Vec<MatchRecord>> {
        let matches = read_lock(&self.matches, "matches")?;
        Ok(matches.records.clone())
    }

    fn get_history(&self, player_id: &PlayerId) -> Result<Vec<MatchHistoryEntry>> {
        let history = read_lock(&self.history, "history")?;
        Ok(history
            .iter()
            .filter(|entry| &entry.player_id == player_id)
            .cloned()
            .collect())
    }
}

/// Mock player storage for testing
///
/// Behaves like the in-memory storage but records every store call and can be
/// told to fail writes.
#[derive(Debug, Default)]
pub struct MockPlayerStorage {
    inner: InMemoryPlayerStorage,
    store_calls: RwLock<Vec<PlayerRecord>>,
    fail_writes: RwLock<bool>,
}

impl MockPlayerStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all store calls made (for testing)
    pub fn get_store_calls(&self) -> Vec<PlayerRecord> {
        self.store_calls
            .read()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Clear store calls (for testing)
    pub fn clear_store_calls(&self) {
        if let Ok(mut calls) = self.store_calls.write() {
            calls.clear();
        }
    }

    /// Make every subsequent write fail
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_writes.write() {
            *flag = fail;
        }
    }

    /// Preset players for testing
    pub fn preset_players(&self, records: Vec<PlayerRecord>) -> Result<()> {
        self.inner.store_players(records)
    }

    fn check_writable(&self) -> Result<()> {
        let fail = self.fail_writes.read().map(|flag| *flag).unwrap_or(false);
        if fail {
            return Err(RatingError::StorageError {
                message: "Mock storage configured to fail writes".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl PlayerStorage for MockPlayerStorage {
    fn get_player(&self, player_id: &PlayerId) -> Result<Option<PlayerRecord>> {
        self.inner.get_player(player_id)
    }

    fn get_players(&self, player_ids: &[PlayerId]) -> Result<HashMap<PlayerId, PlayerRecord>> {
        self.inner.get_players(player_ids)
    }

    fn store_player(&self, record: PlayerRecord) -> Result<()> {
        self.check_writable()?;
        if let Ok(mut calls) = self.store_calls.write() {
            calls.push(record.clone());
        }
        self.inner.store_player(record)
    }

    fn store_players(&self, records: Vec<PlayerRecord>) -> Result<()> {
        self.check_writable()?;
        if let Ok(mut calls) = self.store_calls.write() {
            calls.extend(records.clone());
        }
        self.inner.store_players(records)
    }

    fn register_player(&self, player_id: &PlayerId, name: &str) -> Result<PlayerRecord> {
        self.check_writable()?;
        self.inner.register_player(player_id, name)
    }

    fn get_all_players(&self) -> Result<HashMap<PlayerId, PlayerRecord>> {
        self.inner.get_all_players()
    }

    fn remove_player(&self, player_id: &PlayerId) -> Result<bool> {
        self.check_writable()?;
        self.inner.remove_player(player_id)
    }

    fn leaderboard(&self, limit: Option<usize>) -> Result<Vec<PlayerRecord>> {
        self.inner.leaderboard(limit)
    }

    fn player_count(&self) -> Result<usize> {
        self.inner.player_count()
    }

    fn has_match(&self, match_id: &MatchId) -> Result<bool> {
        self.inner.has_match(match_id)
    }

    fn commit_match(
        &self,
        players: Vec<PlayerRecord>,
        record: MatchRecord,
        history: Vec<MatchHistoryEntry>,
    ) -> Result<()> {
        self.check_writable()?;
        if let Ok(mut calls) = self.store_calls.write() {
            calls.extend(players.clone());
        }
        self.inner.commit_match(players, record, history)
    }

    fn get_matches(&self) -> Result<Vec<MatchRecord>> {
        self.inner.get_matches()
    }

    fn get_history(&self, player_id: &PlayerId) -> Result<Vec<MatchHistoryEntry>> {
        self.inner.get_history(player_id)
    }
}
