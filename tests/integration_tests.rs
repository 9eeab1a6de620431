//! Integration tests for the club-ratings service
//!
//! These tests drive the whole system through its public surfaces:
//! - Match reports arriving as AMQP payloads and the events published back
//! - Singles and doubles processing against shared storage
//! - Inactivity, streaks and history across a season of matches
//! - Concurrent processing of matches that share players
//! - Configuration and roster files feeding the service state

mod fixtures;

use club_ratings::amqp::handlers::dispatch_message;
use club_ratings::amqp::messages::{MessageEnvelope, MATCH_REPORT_ROUTING_KEY};
use club_ratings::config::{AppConfig, ProcessingSettings};
use club_ratings::rating::PlayerStorage;
use club_ratings::service::AppState;
use club_ratings::stats::{partnerships, player_summary, rivalries};
use club_ratings::types::{MatchOutcome, MatchReport, PairRatingUpdate, RatingUpdateResult};
use club_ratings::{MatchProcessor, RatingError};
use std::sync::Arc;

use fixtures::{
    create_app_state, create_processor, create_storage, doubles, report, set_last_played,
    singles,
};

fn id(player: &str) -> String {
    player.to_string()
}

#[tokio::test]
async fn test_report_payload_to_ratings_updated_event() {
    let (state, publisher) = create_app_state(&[("alice", 1000.0), ("bob", 1000.0)]);
    let handler = state.message_handler();

    let report = singles("alice", "bob", 21, 15);
    let payload = serde_json::to_vec(&report).unwrap();

    dispatch_message(handler.as_ref(), &payload).await.unwrap();

    let events = publisher.get_ratings_updated();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.match_id, report.match_id);

    let alice = event.player_updates.iter().find(|u| u.id == "alice").unwrap();
    let bob = event.player_updates.iter().find(|u| u.id == "bob").unwrap();
    assert_eq!(alice.rating, 1020.0);
    assert_eq!(alice.streak_count, 1);
    assert_eq!(alice.wins, 1);
    assert_eq!(bob.rating, 993.0);
    assert_eq!(bob.streak_count, 0);
    assert_eq!(bob.matches_played, 1);

    let changes: Vec<i64> = event.match_history.iter().map(|h| h.rating_change).collect();
    assert_eq!(changes, vec![20, -7]);
}

#[tokio::test]
async fn test_enveloped_report_is_accepted() {
    let (state, publisher) = create_app_state(&[("alice", 1000.0), ("bob", 1000.0)]);
    let handler = state.message_handler();

    let envelope = MessageEnvelope::new(
        singles("bob", "alice", 21, 19),
        MATCH_REPORT_ROUTING_KEY.to_string(),
    );
    dispatch_message(handler.as_ref(), &envelope.to_bytes().unwrap())
        .await
        .unwrap();

    assert_eq!(publisher.get_ratings_updated().len(), 1);
}

#[tokio::test]
async fn test_rejected_reports_leave_ratings_untouched() {
    let (state, publisher) = create_app_state(&[("alice", 1000.0), ("bob", 1000.0)]);
    let handler = state.message_handler();

    let invalid = vec![
        singles("alice", "bob", 21, 21),
        singles("alice", "bob", 45, 15),
        singles("alice", "ghost", 21, 15),
        report(&["alice"], &["alice"], 21, 15),
        report(&["alice", "bob", "carol"], &["dave"], 21, 15),
    ];
    for report in invalid {
        let payload = serde_json::to_vec(&report).unwrap();
        dispatch_message(handler.as_ref(), &payload).await.unwrap();
    }

    let rejected = publisher.get_match_rejected();
    assert_eq!(rejected.len(), 5);
    assert_eq!(rejected[0].error_kind, "invalid_report");
    assert_eq!(rejected[2].error_kind, "player_not_found");
    assert!(publisher.get_ratings_updated().is_empty());

    let storage = state.storage();
    let alice = storage.get_player(&id("alice")).unwrap().unwrap();
    assert_eq!(alice.rating, 1000.0);
    assert_eq!(alice.matches_played, 0);
    assert!(storage.get_matches().unwrap().is_empty());

    let stats = state.processor().stats().unwrap();
    assert_eq!(stats.matches_rejected, 5);
    assert_eq!(stats.matches_processed, 0);
}

#[tokio::test]
async fn test_doubles_match_updates_all_four_players() {
    let storage = create_storage(&[
        ("a1", 1000.0),
        ("a2", 1000.0),
        ("b1", 1000.0),
        ("b2", 1000.0),
    ]);
    let processor = create_processor(storage.clone(), ProcessingSettings::default());

    let result = processor
        .process_match(doubles(["a1", "a2"], ["b1", "b2"], 21, 15))
        .await
        .unwrap();

    assert_eq!(result.format(), "doubles");
    assert_eq!(result.pairings.len(), 4);

    for winner in ["a1", "a2"] {
        let record = storage.get_player(&id(winner)).unwrap().unwrap();
        assert_eq!(record.rating, 1040.0);
        assert_eq!(record.wins, 1);
        let history = storage.get_history(&id(winner)).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].rating_change, 40);
    }
    for loser in ["b1", "b2"] {
        let record = storage.get_player(&id(loser)).unwrap().unwrap();
        assert_eq!(record.rating, 986.0);
        assert_eq!(record.wins, 0);
        assert_eq!(record.streak_count, Some(0));
    }
}

#[tokio::test]
async fn test_long_inactivity_decays_winner() {
    let storage = create_storage(&[("idle", 1000.0), ("busy", 1000.0)]);
    set_last_played(storage.as_ref(), "idle", 30);
    set_last_played(storage.as_ref(), "busy", 0);
    let processor = create_processor(storage.clone(), ProcessingSettings::default());

    let result = processor
        .process_match(singles("idle", "busy", 21, 15))
        .await
        .unwrap();

    // 45 points of decay outweigh the win
    let idle = result.update_for("idle").unwrap();
    assert_eq!(idle.rating, 974.0);
    assert_eq!(idle.streak_count, 0);

    let busy = result.update_for("busy").unwrap();
    assert_eq!(busy.rating, 993.0);
}

#[tokio::test]
async fn test_season_statistics() {
    let storage = create_storage(&[
        ("alice", 1000.0),
        ("bob", 1000.0),
        ("carol", 1000.0),
        ("dave", 1000.0),
    ]);
    let processor = create_processor(storage.clone(), ProcessingSettings::default());

    let season = vec![
        singles("alice", "bob", 21, 19),
        singles("bob", "alice", 21, 18),
        singles("alice", "bob", 22, 20),
        singles("carol", "dave", 21, 5),
        singles("carol", "dave", 21, 3),
        doubles(["alice", "carol"], ["bob", "dave"], 21, 12),
        doubles(["alice", "carol"], ["bob", "dave"], 21, 17),
        doubles(["bob", "dave"], ["alice", "carol"], 21, 16),
    ];
    for result in processor.process_batch(season).await {
        result.unwrap();
    }

    let matches = storage.get_matches().unwrap();
    assert_eq!(matches.len(), 8);

    let rivals = rivalries(&matches, 2, 5);
    assert_eq!(rivals.len(), 2);
    // The alice/bob series is far closer than carol/dave
    assert_eq!(rivals[0].player_one, "alice");
    assert_eq!(rivals[0].player_two, "bob");
    assert_eq!(rivals[0].match_count, 3);
    assert_eq!(rivals[0].player_one_wins, 2);
    assert_eq!(rivals[1].player_one, "carol");

    let partners = partnerships(&matches, 2, 5);
    assert_eq!(partners.len(), 2);
    assert_eq!(partners[0].player_one, "alice");
    assert_eq!(partners[0].player_two, "carol");
    assert_eq!(partners[0].matches_won, 2);
    assert_eq!(partners[1].matches_won, 1);

    let carol = storage.get_player(&id("carol")).unwrap().unwrap();
    let summary = player_summary(&carol, &storage.get_history(&id("carol")).unwrap());
    assert_eq!(summary.matches_played, 5);
    assert_eq!(summary.wins, 4);
    assert_eq!(summary.losses, 1);
    assert_eq!(summary.current_streak, 0);
    assert!(summary.total_rating_change > 0);
    assert!(summary.peak_rating >= carol.rating);

    let leaderboard = storage.leaderboard(Some(1)).unwrap();
    assert_eq!(leaderboard[0].id, "carol");
}

#[tokio::test]
async fn test_streak_bonus_applies_from_third_significant_win() {
    let storage = create_storage(&[("alice", 1000.0), ("bob", 1000.0), ("carol", 1000.0)]);
    let processor = create_processor(storage.clone(), ProcessingSettings::default());

    for opponent in ["bob", "carol"] {
        processor
            .process_match(singles("alice", opponent, 21, 2))
            .await
            .unwrap();
    }

    let alice = storage.get_player(&id("alice")).unwrap().unwrap();
    let bob = storage.get_player(&id("bob")).unwrap().unwrap();
    assert_eq!(alice.streak_count, Some(2));

    let mut without_streak = alice.rating_state();
    without_streak.streak_count = None;
    let plain = processor
        .calculator()
        .calculate_pair(
            &without_streak,
            &bob.rating_state(),
            MatchOutcome::new(21, 2),
            0,
            0,
        )
        .unwrap();

    let result = processor
        .process_match(singles("alice", "bob", 21, 2))
        .await
        .unwrap();
    assert_eq!(result.update_for("alice").unwrap().streak_count, 3);

    // 24 * 0.1 * 3 = 7.2 bonus points
    let bonus = result.history[0].rating_change - plain.winner.rating_change;
    assert!((7..=8).contains(&bonus), "bonus was {}", bonus);
}

#[tokio::test]
async fn test_concurrent_matches_do_not_lose_updates() {
    let storage = create_storage(&[("alice", 1000.0), ("bob", 1000.0), ("carol", 1000.0)]);
    let processor = Arc::new(create_processor(
        storage.clone(),
        ProcessingSettings::default(),
    ));

    let handles: Vec<_> = (0..30)
        .map(|i| {
            let processor = processor.clone();
            tokio::spawn(async move {
                let report = match i % 3 {
                    0 => singles("alice", "bob", 21, 18),
                    1 => singles("bob", "carol", 21, 18),
                    _ => singles("carol", "alice", 21, 18),
                };
                processor.process_match(report).await
            })
        })
        .collect();

    for result in futures::future::join_all(handles).await {
        result.unwrap().unwrap();
    }

    for player in ["alice", "bob", "carol"] {
        let record = storage.get_player(&id(player)).unwrap().unwrap();
        assert_eq!(record.matches_played, 20);
        assert_eq!(record.wins, 10);
        assert_eq!(storage.get_history(&id(player)).unwrap().len(), 20);
    }
    assert_eq!(storage.get_matches().unwrap().len(), 30);
    assert_eq!(processor.stats().unwrap().matches_processed, 30);
}

#[tokio::test]
async fn test_processor_uses_injected_calculator() {
    let storage = create_storage(&[("a1", 1000.0), ("a2", 1000.0), ("b1", 1000.0)]);
    let calculator = Arc::new(club_ratings::rating::MockRatingCalculator::new());
    calculator.set_fixed_result(PairRatingUpdate {
        winner: RatingUpdateResult {
            new_rating: 1010,
            rating_change: 10,
        },
        loser: RatingUpdateResult {
            new_rating: 995,
            rating_change: -5,
        },
    });
    let processor = MatchProcessor::new(
        calculator.clone(),
        storage.clone(),
        ProcessingSettings::default(),
    );

    processor
        .process_match(report(&["b1"], &["a1", "a2"], 15, 21))
        .await
        .unwrap();

    assert_eq!(calculator.get_calculation_calls().len(), 2);
    let b1 = storage.get_player(&id("b1")).unwrap().unwrap();
    assert_eq!(b1.rating, 990.0);
    let a1 = storage.get_player(&id("a1")).unwrap().unwrap();
    assert_eq!(a1.rating, 1010.0);
}

#[tokio::test]
async fn test_missing_player_error_is_typed() {
    let storage = create_storage(&[("alice", 1000.0)]);
    let processor = create_processor(storage, ProcessingSettings::default());

    let error = processor
        .process_match(singles("alice", "ghost", 21, 15))
        .await
        .unwrap_err();

    assert!(matches!(
        error.downcast_ref::<RatingError>(),
        Some(RatingError::PlayerNotFound { player_id }) if player_id == "ghost"
    ));
}

#[tokio::test]
async fn test_config_and_roster_files_build_service_state() {
    let dir = std::env::temp_dir().join(format!("club-ratings-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();

    let roster_path = dir.join("players.toml");
    std::fs::write(
        &roster_path,
        r#"
        [[players]]
        id = "alice"
        name = "Alice"
        rating = 1100.0

        [[players]]
        id = "bob"
        name = "Bob"
        "#,
    )
    .unwrap();

    let config_path = dir.join("club-ratings.toml");
    std::fs::write(
        &config_path,
        format!(
            "[processing]\nmax_score = 21\nroster_file = \"{}\"\n",
            roster_path.display()
        ),
    )
    .unwrap();

    let config = tokio_test::assert_ok!(AppConfig::from_file(&config_path));
    assert_eq!(config.processing.max_score, 21);

    let publisher = Arc::new(club_ratings::amqp::publisher::MockEventPublisher::new());
    let state = Arc::new(AppState::with_publisher(config, publisher.clone()).unwrap());
    std::fs::remove_dir_all(&dir).unwrap();

    let storage = state.storage();
    assert_eq!(storage.player_count().unwrap(), 2);
    assert_eq!(storage.get_player(&id("alice")).unwrap().unwrap().rating, 1100.0);
    assert_eq!(storage.get_player(&id("bob")).unwrap().unwrap().rating, 1000.0);

    // The file's score cap applies to the service's processor
    let handler = state.message_handler();
    let over_cap: MatchReport = singles("alice", "bob", 25, 23);
    dispatch_message(handler.as_ref(), &serde_json::to_vec(&over_cap).unwrap())
        .await
        .unwrap();
    assert_eq!(publisher.get_match_rejected().len(), 1);
}
