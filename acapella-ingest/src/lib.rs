//! acapella-ingest: artist discography ingestion
//!
//! Pulls an artist's discography from MusicBrainz, enriches it with images
//! and platform links, writes one snapshot file per run, and imports
//! snapshots into the SQLite catalog.

pub mod db;
pub mod error;
pub mod services;
pub mod utils;

pub use crate::error::{EnrichmentFailure, FetchError, IngestError, UpsertError};
pub use crate::services::{ArtistAggregator, SnapshotWriter};
pub use crate::db::RelationalUpserter;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "acapella_ingest=info,acapella_common=info";

/// Install the fmt subscriber for the command-line tools
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
