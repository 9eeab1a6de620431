//! Match processing
//!
//! Validation of inbound match reports, per-player aggregation of pairing
//! results, and the processor that persists the outcome.

pub mod aggregator;
pub mod processor;
pub mod validation;

pub use aggregator::{AggregatedChange, RatingAggregator};
pub use processor::{MatchProcessingResult, MatchProcessor, ProcessorStats};
pub use validation::validate_match_report;
