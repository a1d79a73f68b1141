//! Artist aggregation
//!
//! Builds one [`Snapshot`] per artist name:
//!
//! 1. Identity resolution (required; no match ends the run)
//! 2. Discography fetch (required)
//! 3. Image enrichment (best-effort)
//! 4. Artist link enrichment (best-effort)
//! 5. Album loop in source order; each album's release lookup is isolated,
//!    so a failing album is kept with an empty tracklist and its siblings
//!    are unaffected
//! 6. Track link enrichment (best-effort, opt-in)
//! 7. Assembly, then hand-off to the [`SnapshotWriter`]
//!
//! Calls are strictly sequential. Every external call waits on its service
//! throttle, and the fetchers are shared by every artist this aggregator
//! processes.

use crate::error::{FetchError, IngestError, Settle};
use crate::services::cover_art::{CoverArtArchive, CoverArtProbe};
use crate::services::fetcher::{
    FetchPolicy, HttpTransport, RateLimitedFetcher, ReqwestTransport, ServiceTag,
};
use crate::services::image_resolver::ImageResolver;
use crate::services::musicbrainz_client::{ArtistDetail, MusicBrainzSource, Release, ReleaseDetail, ReleaseGroup};
use crate::services::platform_links::{LinkRole, PlatformLinkResolver};
use crate::services::snapshot_writer::SnapshotWriter;
use acapella_common::config::IngestConfig;
use acapella_common::{AlbumRecord, ArtistRecord, Snapshot, TrackRecord};
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Behavior switches for one aggregator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregatorOptions {
    /// One link search per track; off by default because it multiplies search quota
    pub enrich_track_links: bool,
}

/// Outcome of building one album
struct AlbumOutcome {
    album: AlbumRecord,
    tracks: Vec<TrackRecord>,
    resolved: bool,
}

/// Running result of the album loop
#[derive(Default)]
struct AlbumFold {
    albums: Vec<AlbumRecord>,
    tracks: Vec<TrackRecord>,
    resolved: usize,
    skipped: usize,
}

impl AlbumFold {
    fn push(mut self, outcome: AlbumOutcome) -> Self {
        if outcome.resolved {
            self.resolved += 1;
        } else {
            self.skipped += 1;
        }
        self.albums.push(outcome.album);
        self.tracks.extend(outcome.tracks);
        self
    }
}

/// Result of one artist in a batch
#[derive(Debug)]
pub struct ArtistOutcome {
    pub name: String,
    pub result: Result<PathBuf, IngestError>,
}

/// Per-artist ingestion pipeline
pub struct ArtistAggregator {
    musicbrainz: MusicBrainzSource,
    images: ImageResolver,
    links: PlatformLinkResolver,
    cover_art: Arc<dyn CoverArtProbe>,
    writer: SnapshotWriter,
    options: AggregatorOptions,
}

impl ArtistAggregator {
    pub fn new(
        musicbrainz: MusicBrainzSource,
        images: ImageResolver,
        links: PlatformLinkResolver,
        cover_art: Arc<dyn CoverArtProbe>,
        writer: SnapshotWriter,
    ) -> Self {
        Self {
            musicbrainz,
            images,
            links,
            cover_art,
            writer,
            options: AggregatorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AggregatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Production aggregator talking to the real services
    pub fn from_config(config: &IngestConfig) -> Result<Self, FetchError> {
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(&config.user_agent)?);
        let cover_art: Arc<dyn CoverArtProbe> = Arc::new(CoverArtArchive::new(&config.user_agent));

        Ok(Self::from_transport(
            transport,
            cover_art,
            &FetchPolicy::default(),
            config,
        ))
    }

    /// Aggregator whose services all share `transport`, one fetcher per service
    pub fn from_transport(
        transport: Arc<dyn HttpTransport>,
        cover_art: Arc<dyn CoverArtProbe>,
        policy: &FetchPolicy,
        config: &IngestConfig,
    ) -> Self {
        let fetcher = |service| RateLimitedFetcher::with_policy(service, transport.clone(), policy);

        let musicbrainz = MusicBrainzSource::new(fetcher(ServiceTag::MusicBrainz));
        let images = ImageResolver::new(fetcher(ServiceTag::AudioDb), fetcher(ServiceTag::Wikimedia));
        let links = PlatformLinkResolver::new(
            fetcher(ServiceTag::WebSearch),
            config.search_api_key.clone(),
            config.search_engine_id.clone(),
        );

        Self::new(
            musicbrainz,
            images,
            links,
            cover_art,
            SnapshotWriter::new(config.output_dir.clone()),
        )
        .with_options(AggregatorOptions {
            enrich_track_links: config.enrich_track_links,
        })
    }

    pub fn writer(&self) -> &SnapshotWriter {
        &self.writer
    }

    /// Build and write the snapshot for `name`
    pub async fn run(&self, name: &str) -> Result<PathBuf, IngestError> {
        let snapshot = self.build_snapshot(name).await?;
        let path = self.writer.write(&snapshot)?;
        Ok(path)
    }

    /// Run every name in order; one artist's failure never stops the batch
    pub async fn run_batch(&self, names: &[String]) -> Vec<ArtistOutcome> {
        let total = names.len();
        let mut outcomes = Vec::with_capacity(total);

        for (idx, name) in names.iter().enumerate() {
            info!("=== Artist {}/{}: {} ===", idx + 1, total, name);
            let result = self.run(name).await;
            if let Err(e) = &result {
                error!(artist = %name, error = %e, "Artist run failed");
            }
            outcomes.push(ArtistOutcome {
                name: name.clone(),
                result,
            });
        }

        outcomes
    }

    /// Build the snapshot for `name` without writing it
    pub async fn build_snapshot(&self, name: &str) -> Result<Snapshot, IngestError> {
        // 1. Identity
        let identity = self
            .musicbrainz
            .resolve_identity(name)
            .await
            .map_err(|source| {
                error!(artist = %name, error = %source, "Identity lookup failed");
                IngestError::Identity {
                    name: name.to_string(),
                    source,
                }
            })?
            .ok_or_else(|| {
                warn!(artist = %name, "Artist not found, nothing written");
                IngestError::NotFound(name.to_string())
            })?;

        // 2. Discography
        let detail = self
            .musicbrainz
            .fetch_discography(&identity.id)
            .await
            .map_err(|source| {
                error!(artist = %name, mbid = %identity.id, error = %source, "Discography fetch failed");
                IngestError::Discography {
                    artist_id: identity.id.clone(),
                    source,
                }
            })?;

        info!(
            artist = %identity.name,
            mbid = %identity.id,
            albums = detail.release_groups.len(),
            "Found artist"
        );

        // 3-4. Artist enrichment
        let artist = self.build_artist(&identity.id, &identity.name, &detail).await;

        // 5. Albums
        let total = detail.release_groups.len();
        let this = self;
        let artist_ref = &artist;
        let fold = stream::iter(detail.release_groups.iter().enumerate())
            .fold(AlbumFold::default(), move |acc, (idx, group)| async move {
                acc.push(this.build_album(artist_ref, group, idx + 1, total).await)
            })
            .await;

        info!(
            artist = %artist.name,
            albums = fold.albums.len(),
            resolved = fold.resolved,
            skipped = fold.skipped,
            tracks = fold.tracks.len(),
            "Album loop finished"
        );

        let AlbumFold { albums, mut tracks, .. } = fold;

        // 6. Track links
        if self.options.enrich_track_links {
            self.enrich_tracks(&artist.name, &mut tracks).await;
        }

        // 7. Assembly
        Ok(Snapshot {
            artist,
            albums,
            tracks,
        })
    }

    async fn build_artist(&self, id: &str, name: &str, detail: &ArtistDetail) -> ArtistRecord {
        let mut artist = ArtistRecord::new(id, name);

        let images = self.images.resolve(id, name).await;
        let curated = images.curated.unwrap_or_default();

        artist.image_url = images.profile;
        artist.cover_image_url = images.cover;
        artist.bio = curated
            .biography
            .or_else(|| detail.disambiguation().map(str::to_string));
        artist.genres = match detail.genre_names() {
            genres if !genres.is_empty() => genres,
            _ => curated.genre.into_iter().collect(),
        };

        if self.links.is_configured() {
            let links = self.links.classify(name, &LinkRole::Artist).await.settle();
            info!(
                artist = %name,
                platforms = links.platform.len(),
                socials = links.social.len(),
                "Artist link enrichment finished"
            );
            artist.platform_links = links.platform;
            artist.socials = links.social;
        } else {
            info!("Web search not configured, skipping platform links");
        }

        artist
    }

    /// First release of the group and its track listing; `None` if the group has no releases
    async fn representative_release(
        &self,
        group: &ReleaseGroup,
    ) -> Result<Option<(Release, ReleaseDetail)>, FetchError> {
        let release = match self.musicbrainz.fetch_album_releases(&group.id).await?.into_iter().next() {
            Some(release) => release,
            None => return Ok(None),
        };
        let detail = self.musicbrainz.fetch_release_detail(&release.id).await?;
        Ok(Some((release, detail)))
    }

    async fn build_album(
        &self,
        artist: &ArtistRecord,
        group: &ReleaseGroup,
        position: usize,
        total: usize,
    ) -> AlbumOutcome {
        let mut album = AlbumRecord::new(
            group.id.clone(),
            group.display_title(),
            artist.id.clone(),
            group.release_date(),
        );

        let (release, detail) = match self.representative_release(group).await {
            Ok(Some((release, detail))) => (Some(release), Some(detail)),
            Ok(None) => {
                warn!("[{}/{}] [EMPTY] {}: no releases", position, total, album.title);
                (None, None)
            }
            Err(e) => {
                warn!("[{}/{}] [SKIP] {}: {}", position, total, album.title, e);
                album.cover_art_url = artist.cover_image_url.clone();
                return AlbumOutcome {
                    album,
                    tracks: Vec::new(),
                    resolved: false,
                };
            }
        };

        let probed = match &release {
            Some(release) => self.cover_art.front_cover(&release.id).await,
            None => None,
        };
        album.cover_art_url = probed.or_else(|| artist.cover_image_url.clone());

        // Tracks inherit the cover, so they are built after it is settled
        let tracks: Vec<TrackRecord> = detail
            .iter()
            .flat_map(|d| d.tracks())
            .filter_map(|track| {
                let recording_id = track.recording_id()?;
                Some(TrackRecord::on_album(
                    recording_id,
                    track.display_title(),
                    track.length_ms(),
                    &album,
                ))
            })
            .collect();
        album.attach_tracks(&tracks);

        if self.links.is_configured() {
            let role = LinkRole::Album {
                artist: artist.name.clone(),
            };
            album.platform_links = self.links.classify(&album.title, &role).await.settle().platform;
        }

        info!("[{}/{}] [OK] {} ({} tracks)", position, total, album.title, tracks.len());

        AlbumOutcome {
            album,
            tracks,
            resolved: true,
        }
    }

    async fn enrich_tracks(&self, artist_name: &str, tracks: &mut [TrackRecord]) {
        if !self.links.is_configured() {
            return;
        }

        let role = LinkRole::Track {
            artist: artist_name.to_string(),
        };
        let mut linked = 0;
        for track in tracks.iter_mut() {
            track.platform_links = self.links.classify(&track.title, &role).await.settle().platform;
            if !track.platform_links.is_empty() {
                linked += 1;
            }
        }

        info!(artist = %artist_name, tracks = tracks.len(), linked, "Track link enrichment finished");
    }
}
