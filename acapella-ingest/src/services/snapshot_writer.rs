//! Snapshot files
//!
//! One file per ingestion run: `<SafeArtistName>_<yyyyMMddHHmmss>.json`,
//! timestamp in UTC. Files are never rewritten, except that two runs for the
//! same artist inside the same second share a name and the later one wins.

use acapella_common::{Result, Snapshot};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Writes snapshots into one output directory
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    output_dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `snapshot` stamped with the current time
    pub fn write(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        self.write_at(snapshot, Utc::now())
    }

    /// Write `snapshot` stamped with `at`
    pub fn write_at(&self, snapshot: &Snapshot, at: DateTime<Utc>) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join(snapshot_file_name(snapshot, at));
        if path.exists() {
            warn!(path = %path.display(), "Snapshot written in the same second already exists, overwriting");
        }

        let json = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(&path, json)?;

        info!(
            path = %path.display(),
            albums = snapshot.albums.len(),
            tracks = snapshot.tracks.len(),
            "Snapshot written"
        );

        Ok(path)
    }
}

/// File name for a snapshot taken at `at`
pub fn snapshot_file_name(snapshot: &Snapshot, at: DateTime<Utc>) -> String {
    let name = safe_artist_name(&snapshot.artist.name);
    let name = if name.is_empty() {
        safe_artist_name(&snapshot.artist.id)
    } else {
        name
    };

    format!("{}_{}.json", name, at.format(TIMESTAMP_FORMAT))
}

/// Artist name with whitespace and path-hostile characters replaced by `_`
pub fn safe_artist_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Artist part of a snapshot file name
///
/// Every run for one artist shares this key; a name without a run timestamp
/// is its own key.
pub fn snapshot_artist_key(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    match stem.rsplit_once('_') {
        Some((name, stamp)) if stamp.len() == 14 && stamp.bytes().all(|b| b.is_ascii_digit()) => {
            name.to_string()
        }
        _ => stem,
    }
}

/// `*.json` files directly inside `dir`, sorted by name
pub fn snapshot_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
