//! Doubles partnerships ranked by win rate

use crate::types::{MatchRecord, PlayerId, TeamSide};
use crate::utils::ratio;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Record of two players on the same doubles team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partnership {
    pub player_one: PlayerId,
    pub player_two: PlayerId,
    pub matches_played: u32,
    pub matches_won: u32,
}

impl Partnership {
    pub fn win_rate(&self) -> f64 {
        ratio(self.matches_won as u64, self.matches_played as u64)
    }
}

fn team_key(team: &[PlayerId]) -> (PlayerId, PlayerId) {
    let (a, b) = (&team[0], &team[1]);
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

/// Best doubles partnerships
///
/// Both teams of every doubles match count. Teams with fewer than
/// `min_matches` games are dropped; the rest are ordered by win rate, then
/// wins, then games played, all descending.
pub fn partnerships(matches: &[MatchRecord], min_matches: u32, limit: usize) -> Vec<Partnership> {
    let mut by_team: HashMap<(PlayerId, PlayerId), Partnership> = HashMap::new();

    for record in matches.iter().filter(|m| m.is_doubles()) {
        for side in [TeamSide::A, TeamSide::B] {
            let (one, two) = team_key(record.team(side));
            let entry = by_team
                .entry((one.clone(), two.clone()))
                .or_insert_with(|| Partnership {
                    player_one: one,
                    player_two: two,
                    matches_played: 0,
                    matches_won: 0,
                });

            entry.matches_played += 1;
            if record.winner == side {
                entry.matches_won += 1;
            }
        }
    }

    let mut ranked: Vec<Partnership> = by_team
        .into_values()
        .filter(|p| p.matches_played >= min_matches)
        .collect();

    ranked.sort_by(|a, b| {
        b.win_rate()
            .partial_cmp(&a.win_rate())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.matches_won.cmp(&a.matches_won))
            .then_with(|| b.matches_played.cmp(&a.matches_played))
            .then_with(|| a.player_one.cmp(&b.player_one))
    });
    ranked.truncate(limit);
    ranked
}
