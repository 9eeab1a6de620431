//! Match statistics
//!
//! Read-only views computed from processed matches and rating history:
//! singles rivalries, doubles partnerships and per-player summaries.

pub mod partnership;
pub mod rivalry;
pub mod summary;

pub use partnership::{partnerships, Partnership};
pub use rivalry::{rivalries, Rivalry};
pub use summary::{player_summary, PlayerSummary};

/// Fewest matches a pairing needs before it is reported
pub const DEFAULT_MIN_MATCHES: u32 = 2;

/// Number of entries returned by default
pub const DEFAULT_LIMIT: usize = 5;
