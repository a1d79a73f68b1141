//! Relational catalog access
//!
//! Schema creation lives in `acapella_common::db`; this module writes
//! snapshots into it and reads back verification counts.

pub mod stats;
pub mod upserter;

pub use stats::{catalog_stats, check_connection, ArtistCounts, CatalogStats};
pub use upserter::{EntityTally, FileOutcome, ImportSummary, RelationalUpserter, UpsertResult};
