//! Error types for acapella-ingest
//!
//! Failures fall in five classes:
//! - `FetchError::Transient` / `FetchError::Permanent`: outcome of one external call
//! - `IngestError`: required-path failure that ends an artist run
//! - `EnrichmentFailure`: best-effort step failure, always settled to a default
//! - `UpsertError`: single-entity write failure, counted and skipped

use thiserror::Error;
use tracing::warn;

/// Outcome of a failed external call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Connection, timeout, truncated body, or a retryable status (429, 5xx gateway)
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Non-retryable status or undecodable response
    #[error("Permanent failure (status {status:?}): {message}")]
    Permanent { status: Option<u16>, message: String },
}

impl FetchError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            429 | 500 | 502 | 503 | 504 => {
                FetchError::Transient(format!("HTTP {}: {}", status, truncate(&body, 200)))
            }
            _ => FetchError::Permanent {
                status: Some(status),
                message: truncate(&body, 200).to_string(),
            },
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Required-path failure: the artist run ends and no snapshot is written
#[derive(Debug, Error)]
pub enum IngestError {
    /// Identity search returned no candidates
    #[error("Artist not found: {0}")]
    NotFound(String),

    #[error("Identity lookup failed for '{name}': {source}")]
    Identity {
        name: String,
        #[source]
        source: FetchError,
    },

    #[error("Discography fetch failed for {artist_id}: {source}")]
    Discography {
        artist_id: String,
        #[source]
        source: FetchError,
    },

    #[error("Snapshot write failed: {0}")]
    Snapshot(#[from] acapella_common::Error),
}

/// Failure of a best-effort enrichment step
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{stage} enrichment failed: {reason}")]
pub struct EnrichmentFailure {
    pub stage: &'static str,
    pub reason: String,
}

impl EnrichmentFailure {
    pub fn new(stage: &'static str, reason: impl std::fmt::Display) -> Self {
        Self {
            stage,
            reason: reason.to_string(),
        }
    }
}

/// Result of a best-effort step
pub type Enrichment<T> = Result<T, EnrichmentFailure>;

/// Settle a best-effort result to a value, never an error
pub trait Settle<T> {
    /// Value on success, `T::default()` (logged) on failure
    fn settle(self) -> T
    where
        T: Default;

    /// Value on success, `fallback` (logged) on failure
    fn settle_or(self, fallback: T) -> T;
}

impl<T> Settle<T> for Enrichment<T> {
    fn settle(self) -> T
    where
        T: Default,
    {
        self.settle_or(T::default())
    }

    fn settle_or(self, fallback: T) -> T {
        match self {
            Ok(value) => value,
            Err(failure) => {
                warn!(
                    stage = failure.stage,
                    reason = %failure.reason,
                    "Best-effort step failed, using default"
                );
                fallback
            }
        }
    }
}

/// Single-entity write failure during snapshot import
#[derive(Debug, Error)]
pub enum UpsertError {
    #[error("{entity} record has no identifier")]
    MissingId { entity: &'static str },

    #[error("{entity} {id} could not be written: {source}")]
    PersistenceConflict {
        entity: &'static str,
        id: String,
        #[source]
        source: acapella_common::Error,
    },
}
