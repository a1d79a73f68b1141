//! Ingestion services
//!
//! Leaf-first: the rate-limited fetcher, the per-source clients built on it,
//! the aggregator that drives them, and the snapshot writer it hands off to.

pub mod artist_aggregator;
pub mod cover_art;
pub mod fetcher;
pub mod image_resolver;
pub mod musicbrainz_client;
pub mod platform_links;
pub mod snapshot_writer;

pub use artist_aggregator::{AggregatorOptions, ArtistAggregator, ArtistOutcome};
pub use cover_art::{CoverArtArchive, CoverArtProbe};
pub use fetcher::{
    FetchPolicy, HttpTransport, RateLimitedFetcher, ReqwestTransport, RetryPolicy, ServiceTag,
};
pub use image_resolver::{select_best_image, ArtistImages, ImageCandidate, ImageResolver, ImageSet};
pub use musicbrainz_client::{Identity, MusicBrainzSource};
pub use platform_links::{classify_urls, LinkBucket, LinkRole, PlatformLinkResolver, PlatformLinks};
pub use snapshot_writer::SnapshotWriter;
