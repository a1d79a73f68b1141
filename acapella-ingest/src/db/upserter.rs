//! Snapshot import into the relational catalog
//!
//! Order inside one snapshot is artist → albums → tracks, since link rows
//! reference both sides. Each entity is written in its own transaction:
//! - Artist: insert, or overwrite every column on conflict
//! - Album / song: insert, or overwrite source-owned columns on conflict.
//!   `review_count` and `likes_count` are never written here, so new rows
//!   start at the column default (0) and existing counts are preserved.
//! - `album_artists` / `song_artists`: insert, ignoring existing pairs
//!
//! A failed entity is logged and counted; the rest of the snapshot still
//! imports. Re-importing the same snapshot is safe and retries only what
//! failed.

use crate::error::UpsertError;
use crate::services::snapshot_writer::{snapshot_artist_key, snapshot_files_in};
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use acapella_common::{AlbumRecord, ArtistRecord, Snapshot, TrackRecord};
use futures::stream::{self, StreamExt};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Success/failure counts for one entity kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityTally {
    pub succeeded: usize,
    pub failed: usize,
}

impl EntityTally {
    fn record(mut self, outcome: Result<(), UpsertError>) -> Self {
        match outcome {
            Ok(()) => self.succeeded += 1,
            Err(e) => {
                warn!(error = %e, "Entity import failed");
                self.failed += 1;
            }
        }
        self
    }

    fn merge(self, other: EntityTally) -> Self {
        Self {
            succeeded: self.succeeded + other.succeeded,
            failed: self.failed + other.failed,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Outcome of importing one snapshot; reported, never persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertResult {
    pub artist: EntityTally,
    pub albums: EntityTally,
    pub tracks: EntityTally,
}

impl UpsertResult {
    pub fn artist_written(&self) -> bool {
        self.artist.failed == 0 && self.artist.succeeded > 0
    }

    pub fn failed(&self) -> usize {
        self.artist.failed + self.albums.failed + self.tracks.failed
    }
}

/// Outcome of one file in a multi-file import
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: acapella_common::Result<UpsertResult>,
}

impl FileOutcome {
    /// A file fails if it cannot be loaded or its artist row was not written
    pub fn succeeded(&self) -> bool {
        matches!(&self.result, Ok(result) if result.artist_written())
    }
}

/// Totals over a multi-file import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub files: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub albums: EntityTally,
    pub tracks: EntityTally,
}

impl ImportSummary {
    fn record(mut self, outcome: &FileOutcome) -> Self {
        self.files += 1;
        if outcome.succeeded() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        if let Ok(result) = &outcome.result {
            self.albums = self.albums.merge(result.albums);
            self.tracks = self.tracks.merge(result.tracks);
        }
        self
    }
}

/// Idempotent snapshot importer
#[derive(Debug, Clone)]
pub struct RelationalUpserter {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl RelationalUpserter {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
        }
    }

    pub fn with_max_lock_wait_ms(mut self, max_lock_wait_ms: u64) -> Self {
        self.max_lock_wait_ms = max_lock_wait_ms;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Import one snapshot, entity by entity
    pub async fn import_snapshot(&self, snapshot: &Snapshot) -> UpsertResult {
        let artist = EntityTally::default().record(self.upsert_artist(&snapshot.artist).await);

        let this = self;
        let albums = stream::iter(snapshot.albums.iter())
            .fold(EntityTally::default(), move |tally, album| async move {
                tally.record(this.upsert_album(album).await)
            })
            .await;

        let tracks = stream::iter(snapshot.tracks.iter())
            .fold(EntityTally::default(), move |tally, track| async move {
                tally.record(this.upsert_track(track).await)
            })
            .await;

        let result = UpsertResult {
            artist,
            albums,
            tracks,
        };

        info!(
            artist = %snapshot.artist.name,
            albums_ok = albums.succeeded,
            albums_failed = albums.failed,
            tracks_ok = tracks.succeeded,
            tracks_failed = tracks.failed,
            "Snapshot imported"
        );

        result
    }

    /// Load and import one snapshot file
    pub async fn import_file(&self, path: &Path) -> acapella_common::Result<UpsertResult> {
        let snapshot = Snapshot::load(path).map_err(|e| {
            error!(path = %path.display(), error = %e, "Cannot load snapshot");
            e
        })?;
        Ok(self.import_snapshot(&snapshot).await)
    }

    /// Import several files, at most `concurrency` artists at a time
    ///
    /// Runs for one artist write the same rows, so they are imported one
    /// after another, oldest first, and the newest snapshot always lands last.
    pub async fn import_paths(&self, paths: &[PathBuf], concurrency: usize) -> (Vec<FileOutcome>, ImportSummary) {
        let this = self;
        let groups: Vec<Vec<FileOutcome>> = stream::iter(artist_groups(paths))
            .map(move |group| this.import_group(group))
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;
        let outcomes: Vec<FileOutcome> = groups.into_iter().flatten().collect();

        let summary = outcomes
            .iter()
            .fold(ImportSummary::default(), |summary, outcome| summary.record(outcome));

        info!(
            files = summary.files,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Import finished"
        );

        (outcomes, summary)
    }

    async fn import_group(&self, group: Vec<PathBuf>) -> Vec<FileOutcome> {
        let this = self;
        stream::iter(group)
            .then(move |path| async move {
                let result = this.import_file(&path).await;
                FileOutcome { path, result }
            })
            .collect()
            .await
    }

    /// Import every `*.json` file in `dir`
    pub async fn import_dir(
        &self,
        dir: &Path,
        concurrency: usize,
    ) -> acapella_common::Result<(Vec<FileOutcome>, ImportSummary)> {
        let files = snapshot_files_in(dir)?;
        info!(dir = %dir.display(), files = files.len(), "Importing snapshot directory");
        Ok(self.import_paths(&files, concurrency).await)
    }

    async fn upsert_artist(&self, artist: &ArtistRecord) -> Result<(), UpsertError> {
        require_id("artist", &artist.id)?;
        retry_on_lock("artist upsert", self.max_lock_wait_ms, || write_artist(&self.pool, artist))
            .await
            .map_err(|source| UpsertError::PersistenceConflict {
                entity: "artist",
                id: artist.id.clone(),
                source,
            })
    }

    async fn upsert_album(&self, album: &AlbumRecord) -> Result<(), UpsertError> {
        require_id("album", &album.id)?;
        retry_on_lock("album upsert", self.max_lock_wait_ms, || write_album(&self.pool, album))
            .await
            .map_err(|source| UpsertError::PersistenceConflict {
                entity: "album",
                id: album.id.clone(),
                source,
            })
    }

    async fn upsert_track(&self, track: &TrackRecord) -> Result<(), UpsertError> {
        require_id("track", &track.id)?;
        retry_on_lock("track upsert", self.max_lock_wait_ms, || write_track(&self.pool, track))
            .await
            .map_err(|source| UpsertError::PersistenceConflict {
                entity: "track",
                id: track.id.clone(),
                source,
            })
    }
}

/// Paths bucketed by artist, each bucket in run order
fn artist_groups(paths: &[PathBuf]) -> Vec<Vec<PathBuf>> {
    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for path in paths {
        groups.entry(snapshot_artist_key(path)).or_default().push(path.clone());
    }

    groups
        .into_values()
        .map(|mut group| {
            group.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
            group
        })
        .collect()
}

fn require_id(entity: &'static str, id: &str) -> Result<(), UpsertError> {
    if id.trim().is_empty() {
        Err(UpsertError::MissingId { entity })
    } else {
        Ok(())
    }
}

async fn write_artist(pool: &SqlitePool, artist: &ArtistRecord) -> acapella_common::Result<()> {
    let genres = serde_json::to_string(&artist.genres)?;
    let socials = serde_json::to_string(&artist.socials)?;
    let platform_links = serde_json::to_string(&artist.platform_links)?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO artists (
            id, name, name_lowercase, image_url, cover_image_url,
            genres, bio, socials, platform_links
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            name_lowercase = excluded.name_lowercase,
            image_url = excluded.image_url,
            cover_image_url = excluded.cover_image_url,
            genres = excluded.genres,
            bio = excluded.bio,
            socials = excluded.socials,
            platform_links = excluded.platform_links,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&artist.id)
    .bind(&artist.name)
    .bind(&artist.name_lowercase)
    .bind(&artist.image_url)
    .bind(&artist.cover_image_url)
    .bind(genres)
    .bind(&artist.bio)
    .bind(socials)
    .bind(platform_links)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

async fn write_album(pool: &SqlitePool, album: &AlbumRecord) -> acapella_common::Result<()> {
    let platform_links = serde_json::to_string(&album.platform_links)?;
    let tracklist = serde_json::to_string(&album.tracklist)?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO albums (
            id, title, title_lowercase, release_date, cover_art_url,
            platform_links, tracklist
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            title_lowercase = excluded.title_lowercase,
            release_date = excluded.release_date,
            cover_art_url = excluded.cover_art_url,
            platform_links = excluded.platform_links,
            tracklist = excluded.tracklist,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&album.id)
    .bind(&album.title)
    .bind(&album.title_lowercase)
    .bind(&album.release_date)
    .bind(&album.cover_art_url)
    .bind(platform_links)
    .bind(tracklist)
    .execute(&mut *tx)
    .await?;

    for artist_id in &album.artist_ids {
        sqlx::query(
            "INSERT INTO album_artists (album_id, artist_id) VALUES (?, ?) ON CONFLICT DO NOTHING",
        )
        .bind(&album.id)
        .bind(artist_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

async fn write_track(pool: &SqlitePool, track: &TrackRecord) -> acapella_common::Result<()> {
    let credits = serde_json::to_string(&track.credits)?;
    let platform_links = serde_json::to_string(&track.platform_links)?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO songs (
            id, title, title_lowercase, album_id, duration, release_date,
            genre, credits, cover_art_url, platform_links
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            title_lowercase = excluded.title_lowercase,
            album_id = excluded.album_id,
            duration = excluded.duration,
            release_date = excluded.release_date,
            genre = excluded.genre,
            credits = excluded.credits,
            cover_art_url = excluded.cover_art_url,
            platform_links = excluded.platform_links,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&track.id)
    .bind(&track.title)
    .bind(&track.title_lowercase)
    .bind(&track.album_id)
    .bind(i64::from(track.duration_seconds))
    .bind(&track.release_date)
    .bind(&track.genre)
    .bind(credits)
    .bind(&track.cover_art_url)
    .bind(platform_links)
    .execute(&mut *tx)
    .await?;

    for artist_id in &track.artist_ids {
        sqlx::query(
            "INSERT INTO song_artists (song_id, artist_id) VALUES (?, ?) ON CONFLICT DO NOTHING",
        )
        .bind(&track.id)
        .bind(artist_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
