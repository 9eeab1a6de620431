//! Match report validation
//!
//! Reports are checked before any player is loaded, so the rating engine
//! only ever sees decided singles or doubles matches with sane scores.

use crate::error::{RatingError, Result};
use crate::types::{MatchReport, TeamSide};
use std::collections::HashSet;

/// Largest team a report may carry
pub const MAX_TEAM_SIZE: usize = 2;

fn invalid(reason: impl Into<String>) -> anyhow::Error {
    RatingError::InvalidMatchReport {
        reason: reason.into(),
    }
    .into()
}

/// Validate a match report and return the winning side
pub fn validate_match_report(report: &MatchReport, max_score: u32) -> Result<TeamSide> {
    if report.match_id.is_nil() {
        return Err(invalid("match id cannot be nil"));
    }

    for side in [TeamSide::A, TeamSide::B] {
        let team = report.team(side);
        if team.is_empty() || team.len() > MAX_TEAM_SIZE {
            return Err(invalid(format!(
                "{} must have 1 to {} players, got {}",
                side,
                MAX_TEAM_SIZE,
                team.len()
            )));
        }
        if team.iter().any(|id| id.trim().is_empty()) {
            return Err(invalid(format!("{} contains an empty player id", side)));
        }
    }

    let mut seen = HashSet::new();
    for player_id in report.team_a.iter().chain(report.team_b.iter()) {
        if !seen.insert(player_id.as_str()) {
            return Err(invalid(format!(
                "player {} appears more than once",
                player_id
            )));
        }
    }

    for side in [TeamSide::A, TeamSide::B] {
        let score = report.score(side);
        if score > max_score {
            return Err(invalid(format!(
                "{} score {} exceeds maximum of {}",
                side, score, max_score
            )));
        }
    }

    report.winning_side().ok_or_else(|| {
        invalid(format!(
            "tied score {}-{} cannot be rated",
            report.team_a_score, report.team_b_score
        ))
    })
}
