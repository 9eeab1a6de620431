//! Singles rivalries ranked by how close the games were

use crate::types::{MatchRecord, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Head-to-head record between two singles players
///
/// `player_one` is always the lexicographically smaller id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rivalry {
    pub player_one: PlayerId,
    pub player_two: PlayerId,
    pub match_count: u32,
    pub player_one_wins: u32,
    pub player_two_wins: u32,
    /// Mean absolute score difference
    pub average_score_difference: f64,
}

impl Rivalry {
    fn new(player_one: PlayerId, player_two: PlayerId) -> Self {
        Self {
            player_one,
            player_two,
            match_count: 0,
            player_one_wins: 0,
            player_two_wins: 0,
            average_score_difference: 0.0,
        }
    }

    fn add_match(&mut self, winner: &PlayerId, score_difference: u32) {
        let total = self.average_score_difference * self.match_count as f64 + score_difference as f64;
        self.match_count += 1;
        self.average_score_difference = total / self.match_count as f64;

        if winner == &self.player_one {
            self.player_one_wins += 1;
        } else {
            self.player_two_wins += 1;
        }
    }
}

/// Closest singles rivalries
///
/// Pairs with fewer than `min_matches` games are dropped. The rest are
/// ordered by average score difference (closest first), then by match count.
pub fn rivalries(matches: &[MatchRecord], min_matches: u32, limit: usize) -> Vec<Rivalry> {
    let mut by_pair: HashMap<(PlayerId, PlayerId), Rivalry> = HashMap::new();

    for record in matches.iter().filter(|m| m.is_singles()) {
        let (a, b) = (&record.team_a[0], &record.team_b[0]);
        let key = if a <= b {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        };

        let winner = &record.winners()[0];
        by_pair
            .entry(key.clone())
            .or_insert_with(|| Rivalry::new(key.0, key.1))
            .add_match(winner, record.score_difference());
    }

    let mut ranked: Vec<Rivalry> = by_pair
        .into_values()
        .filter(|r| r.match_count >= min_matches)
        .collect();

    ranked.sort_by(|a, b| {
        a.average_score_difference
            .partial_cmp(&b.average_score_difference)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.match_count.cmp(&a.match_count))
            .then_with(|| a.player_one.cmp(&b.player_one))
    });
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{DEFAULT_LIMIT, DEFAULT_MIN_MATCHES};
    use crate::types::TeamSide;
    use chrono::Utc;
    use uuid::Uuid;

    fn singles(a: &str, b: &str, a_score: u32, b_score: u32) -> MatchRecord {
        MatchRecord {
            match_id: Uuid::new_v4(),
            team_a: vec![a.to_string()],
            team_b: vec![b.to_string()],
            team_a_score: a_score,
            team_b_score: b_score,
            winner: if a_score > b_score { TeamSide::A } else { TeamSide::B },
            played_at: Utc::now(),
        }
    }

    #[test]
    fn test_rivalry_aggregation() {
        let matches = vec![
            singles("bob", "alice", 21, 19),
            singles("alice", "bob", 21, 17),
            singles("alice", "bob", 21, 18),
        ];

        let result = rivalries(&matches, DEFAULT_MIN_MATCHES, DEFAULT_LIMIT);
        assert_eq!(result.len(), 1);

        let rivalry = &result[0];
        assert_eq!(rivalry.player_one, "alice");
        assert_eq!(rivalry.player_two, "bob");
        assert_eq!(rivalry.match_count, 3);
        assert_eq!(rivalry.player_one_wins, 2);
        assert_eq!(rivalry.player_two_wins, 1);
        assert!((rivalry.average_score_difference - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_rivalry_ordering_and_filtering() {
        let matches = vec![
            // alice/bob: average 5
            singles("alice", "bob", 21, 16),
            singles("alice", "bob", 21, 16),
            // carol/dave: average 2 over two games
            singles("carol", "dave", 21, 19),
            singles("dave", "carol", 21, 19),
            // erin/frank: average 2 over three games
            singles("erin", "frank", 21, 19),
            singles("erin", "frank", 21, 19),
            singles("frank", "erin", 21, 19),
            // single game, filtered out
            singles("alice", "carol", 21, 20),
        ];

        let result = rivalries(&matches, 2, 5);
        let pairs: Vec<(&str, &str)> = result
            .iter()
            .map(|r| (r.player_one.as_str(), r.player_two.as_str()))
            .collect();

        assert_eq!(
            pairs,
            vec![("erin", "frank"), ("carol", "dave"), ("alice", "bob")]
        );

        assert_eq!(rivalries(&matches, 2, 1).len(), 1);
        assert_eq!(rivalries(&matches, 1, 10).len(), 4);
    }

    #[test]
    fn test_doubles_matches_are_ignored() {
        let doubles = MatchRecord {
            match_id: Uuid::new_v4(),
            team_a: vec!["a".to_string(), "b".to_string()],
            team_b: vec!["c".to_string(), "d".to_string()],
            team_a_score: 21,
            team_b_score: 19,
            winner: TeamSide::A,
            played_at: Utc::now(),
        };

        assert!(rivalries(&[doubles.clone(), doubles], 1, 5).is_empty());
    }
}
