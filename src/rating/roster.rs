//! Player roster loading
//!
//! The service keeps players in memory, so the club roster is seeded at
//! startup from a TOML file of `[[players]]` tables.

use crate::config::rating::BASELINE;
use crate::error::{RatingError, Result};
use crate::rating::storage::{PlayerRecord, PlayerStorage};
use anyhow::Context;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// One roster row
#[derive(Debug, Clone, Deserialize)]
pub struct RosterEntry {
    pub id: String,
    pub name: String,
    /// Starting rating, defaults to the baseline
    #[serde(default)]
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RosterFile {
    #[serde(default)]
    players: Vec<RosterEntry>,
}

/// Parse roster TOML into player records
pub fn parse_roster(contents: &str) -> Result<Vec<PlayerRecord>> {
    let roster: RosterFile = toml::from_str(contents).context("Failed to parse roster")?;

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(roster.players.len());
    for entry in roster.players {
        if entry.id.trim().is_empty() {
            return Err(RatingError::ConfigurationError {
                message: "Roster entry with empty player id".to_string(),
            }
            .into());
        }
        if !seen.insert(entry.id.clone()) {
            return Err(RatingError::ConfigurationError {
                message: format!("Duplicate roster entry: {}", entry.id),
            }
            .into());
        }
        records.push(PlayerRecord::new(
            entry.id,
            entry.name,
            entry.rating.unwrap_or(BASELINE),
        ));
    }

    Ok(records)
}

/// Load a roster file and store every player it lists
///
/// Returns the number of players stored.
pub fn load_roster(path: &Path, storage: &dyn PlayerStorage) -> Result<usize> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read roster file {}", path.display()))?;
    let records = parse_roster(&contents)?;
    let count = records.len();

    storage.store_players(records)?;
    info!("Loaded {} players from roster {}", count, path.display());

    Ok(count)
}
