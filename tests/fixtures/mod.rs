//! Test fixtures shared by the integration tests

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use club_ratings::amqp::publisher::MockEventPublisher;
use club_ratings::config::{AppConfig, ProcessingSettings};
use club_ratings::processing::MatchProcessor;
use club_ratings::rating::{
    ClubRatingCalculator, InMemoryPlayerStorage, PlayerRecord, PlayerStorage,
};
use club_ratings::service::AppState;
use club_ratings::types::MatchReport;
use std::sync::Arc;

/// Storage holding players at the given ratings
pub fn create_storage(players: &[(&str, f64)]) -> Arc<InMemoryPlayerStorage> {
    let records = players
        .iter()
        .map(|(id, rating)| PlayerRecord::new(*id, capitalize(id), *rating))
        .collect();
    Arc::new(InMemoryPlayerStorage::with_players(records))
}

/// Processor over `storage` with the default club rating parameters
pub fn create_processor(
    storage: Arc<InMemoryPlayerStorage>,
    settings: ProcessingSettings,
) -> MatchProcessor {
    MatchProcessor::new(
        Arc::new(ClubRatingCalculator::default()),
        storage,
        settings,
    )
}

/// Service state without a broker, with the given players stored
pub fn create_app_state(players: &[(&str, f64)]) -> (Arc<AppState>, Arc<MockEventPublisher>) {
    let publisher = Arc::new(MockEventPublisher::new());
    let state = AppState::with_publisher(AppConfig::default(), publisher.clone())
        .expect("Failed to build app state");

    let records = players
        .iter()
        .map(|(id, rating)| PlayerRecord::new(*id, capitalize(id), *rating))
        .collect();
    state
        .storage()
        .store_players(records)
        .expect("Failed to store players");

    (Arc::new(state), publisher)
}

/// Mark a stored player as last active `days` ago
pub fn set_last_played(storage: &dyn PlayerStorage, player_id: &str, days: i64) {
    let mut record = storage
        .get_player(&player_id.to_string())
        .unwrap()
        .expect("player exists");
    record.last_played_at = Some(days_ago(days));
    storage.store_player(record).unwrap();
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

pub fn singles(winner: &str, loser: &str, winner_score: u32, loser_score: u32) -> MatchReport {
    report(&[winner], &[loser], winner_score, loser_score)
}

pub fn doubles(
    winners: [&str; 2],
    losers: [&str; 2],
    winner_score: u32,
    loser_score: u32,
) -> MatchReport {
    report(&winners, &losers, winner_score, loser_score)
}

/// Report with team A listed first
pub fn report(team_a: &[&str], team_b: &[&str], team_a_score: u32, team_b_score: u32) -> MatchReport {
    MatchReport {
        match_id: uuid::Uuid::new_v4(),
        team_a: team_a.iter().map(|id| id.to_string()).collect(),
        team_b: team_b.iter().map(|id| id.to_string()).collect(),
        team_a_score,
        team_b_score,
        played_at: None,
    }
}

fn capitalize(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
