//! Per-player aggregation of pairing results
//!
//! A doubles match is rated as four independent winner/loser pairings. Each
//! player's pairing results are folded into one net change here.

use crate::types::{PairRatingUpdate, PlayerId, PlayerRatingState};
use std::collections::HashMap;

/// Net result of a match for one player
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedChange {
    pub player_id: PlayerId,
    pub is_winner: bool,
    pub rating_before: f64,
    pub rating_after: f64,
    /// Sum of the rounded per-pairing changes
    pub rating_change: i64,
    pub pairings: usize,
}

impl AggregatedChange {
    /// Average change per pairing
    pub fn mean_change(&self) -> f64 {
        if self.pairings == 0 {
            0.0
        } else {
            self.rating_change as f64 / self.pairings as f64
        }
    }
}

#[derive(Debug)]
struct Accumulator {
    is_winner: bool,
    rating_before: f64,
    rating_delta: f64,
    rating_change: i64,
    pairings: usize,
}

/// Folds pairing results into per-player changes
#[derive(Debug)]
pub struct RatingAggregator {
    min_rating: f64,
    order: Vec<PlayerId>,
    players: HashMap<PlayerId, Accumulator>,
}

impl RatingAggregator {
    pub fn new(min_rating: f64) -> Self {
        Self {
            min_rating,
            order: Vec::new(),
            players: HashMap::new(),
        }
    }

    /// Add the engine result for one winner/loser pairing
    pub fn add_pair(
        &mut self,
        winner: &PlayerRatingState,
        loser: &PlayerRatingState,
        update: &PairRatingUpdate,
    ) {
        self.add(
            winner,
            true,
            update.winner.new_rating,
            update.winner.rating_change,
        );
        self.add(loser, false, update.loser.new_rating, update.loser.rating_change);
    }

    fn add(&mut self, player: &PlayerRatingState, is_winner: bool, new_rating: i64, change: i64) {
        let entry = self.players.entry(player.id.clone()).or_insert_with(|| {
            self.order.push(player.id.clone());
            Accumulator {
                is_winner,
                rating_before: player.rating,
                rating_delta: 0.0,
                rating_change: 0,
                pairings: 0,
            }
        });

        entry.rating_delta += new_rating as f64 - entry.rating_before;
        entry.rating_change += change;
        entry.pairings += 1;
    }

    /// Number of distinct players seen so far
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Final per-player changes in first-seen order
    pub fn finish(mut self) -> Vec<AggregatedChange> {
        let min_rating = self.min_rating;
        self.order
            .into_iter()
            .filter_map(|player_id| {
                let acc = self.players.remove(&player_id)?;
                Some(AggregatedChange {
                    player_id,
                    is_winner: acc.is_winner,
                    rating_before: acc.rating_before,
                    rating_after: (acc.rating_before + acc.rating_delta).max(min_rating),
                    rating_change: acc.rating_change,
                    pairings: acc.pairings,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RatingUpdateResult;

    fn pair(winner: (i64, i64), loser: (i64, i64)) -> PairRatingUpdate {
        PairRatingUpdate {
            winner: RatingUpdateResult {
                new_rating: winner.0,
                rating_change: winner.1,
            },
            loser: RatingUpdateResult {
                new_rating: loser.0,
                rating_change: loser.1,
            },
        }
    }

    #[test]
    fn test_singles_passes_engine_output_through() {
        let w = PlayerRatingState::new("w", 1000.0);
        let l = PlayerRatingState::new("l", 1000.0);

        let mut aggregator = RatingAggregator::new(800.0);
        aggregator.add_pair(&w, &l, &pair((1020, 20), (993, -7)));
        let changes = aggregator.finish();

        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].player_id, "w");
        assert!(changes[0].is_winner);
        assert_eq!(changes[0].rating_after, 1020.0);
        assert_eq!(changes[0].rating_change, 20);
        assert_eq!(changes[1].rating_after, 993.0);
        assert_eq!(changes[1].rating_change, -7);
    }

    #[test]
    fn test_doubles_sums_pairings() {
        let w1 = PlayerRatingState::new("w1", 1000.0);
        let w2 = PlayerRatingState::new("w2", 1100.0);
        let l1 = PlayerRatingState::new("l1", 1000.0);
        let l2 = PlayerRatingState::new("l2", 950.0);

        let mut aggregator = RatingAggregator::new(800.0);
        aggregator.add_pair(&w1, &l1, &pair((1020, 20), (993, -7)));
        aggregator.add_pair(&w1, &l2, &pair((1016, 16), (946, -4)));
        aggregator.add_pair(&w2, &l1, &pair((1112, 12), (997, -3)));
        aggregator.add_pair(&w2, &l2, &pair((1110, 10), (949, -1)));

        assert_eq!(aggregator.len(), 4);
        let changes = aggregator.finish();
        let by_id: HashMap<_, _> = changes.iter().map(|c| (c.player_id.as_str(), c)).collect();

        assert_eq!(by_id["w1"].rating_change, 36);
        assert_eq!(by_id["w1"].rating_after, 1036.0);
        assert_eq!(by_id["w1"].pairings, 2);
        assert_eq!(by_id["w1"].mean_change(), 18.0);
        assert_eq!(by_id["w2"].rating_after, 1122.0);
        assert_eq!(by_id["l1"].rating_after, 990.0);
        assert_eq!(by_id["l2"].rating_change, -5);
        assert!(!by_id["l2"].is_winner);
    }

    #[test]
    fn test_aggregate_respects_floor() {
        let l1 = PlayerRatingState::new("l1", 1000.0);
        let l2 = PlayerRatingState::new("l2", 1000.0);
        let low = PlayerRatingState::new("low", 810.0);

        let mut aggregator = RatingAggregator::new(800.0);
        aggregator.add_pair(&l1, &low, &pair((1010, 10), (800, -12)));
        aggregator.add_pair(&l2, &low, &pair((1010, 10), (800, -12)));

        let changes = aggregator.finish();
        let low = changes.iter().find(|c| c.player_id == "low").unwrap();
        assert_eq!(low.rating_after, 800.0);
        assert_eq!(low.rating_change, -24);
    }

    #[test]
    fn test_empty_aggregator() {
        let aggregator = RatingAggregator::new(800.0);
        assert!(aggregator.is_empty());
        assert!(aggregator.finish().is_empty());
    }
}
