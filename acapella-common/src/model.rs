//! Discography records and the snapshot document
//!
//! One [`Snapshot`] holds everything one ingestion run learned about an
//! artist: the artist itself, its albums in source order, and the flattened
//! track list. Field names on the wire match the snapshot files already in
//! circulation (`imageUrl`, `name_lowercase`, ...).
//!
//! Maps are `BTreeMap` so serialized key order is stable across runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Platform or social network name → URL
pub type LinkMap = BTreeMap<String, String>;

/// Artist record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistRecord {
    /// Source-assigned identifier (MusicBrainz artist MBID)
    pub id: String,
    pub name: String,
    /// Lowercased name, used as search key
    #[serde(rename = "name_lowercase")]
    pub name_lowercase: String,
    /// Profile (portrait) image
    #[serde(default)]
    pub image_url: Option<String>,
    /// Wide cover/banner image
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub socials: LinkMap,
    #[serde(default)]
    pub platform_links: LinkMap,
}

impl ArtistRecord {
    /// Create an artist with all optional fields empty
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            name_lowercase: name.to_lowercase(),
            name,
            image_url: None,
            cover_image_url: None,
            genres: Vec::new(),
            bio: None,
            socials: LinkMap::new(),
            platform_links: LinkMap::new(),
        }
    }
}

/// Album record (one MusicBrainz release group)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumRecord {
    pub id: String,
    pub title: String,
    #[serde(rename = "title_lowercase")]
    pub title_lowercase: String,
    #[serde(default)]
    pub artist_ids: Vec<String>,
    /// Release date as the source formats it (`2000`, `2000-07`, `2000-07-10`)
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub cover_art_url: Option<String>,
    /// Track ids in medium/track order
    #[serde(default)]
    pub tracklist: Vec<String>,
    #[serde(default)]
    pub platform_links: LinkMap,
    /// Owned by the relational store; always zero when produced by ingestion
    #[serde(default)]
    pub review_count: i64,
    /// Owned by the relational store; always zero when produced by ingestion
    #[serde(default)]
    pub likes_count: i64,
}

impl AlbumRecord {
    /// Create an album shell with an empty tracklist and zeroed counters
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        artist_id: impl Into<String>,
        release_date: Option<String>,
    ) -> Self {
        let title = title.into();
        Self {
            id: id.into(),
            title_lowercase: title.to_lowercase(),
            title,
            artist_ids: vec![artist_id.into()],
            release_date,
            cover_art_url: None,
            tracklist: Vec::new(),
            platform_links: LinkMap::new(),
            review_count: 0,
            likes_count: 0,
        }
    }

    /// Replace the tracklist with the ids of `tracks`, in order
    pub fn attach_tracks(&mut self, tracks: &[TrackRecord]) {
        self.tracklist = tracks.iter().map(|t| t.id.clone()).collect();
    }
}

/// Track record (one MusicBrainz recording as it appears on an album)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRecord {
    pub id: String,
    pub title: String,
    #[serde(rename = "title_lowercase")]
    pub title_lowercase: String,
    /// Whole seconds
    #[serde(rename = "duration", default)]
    pub duration_seconds: u32,
    #[serde(default)]
    pub artist_ids: Vec<String>,
    pub album_id: String,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    /// Role → credited names. Not populated by ingestion yet.
    #[serde(default)]
    pub credits: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub cover_art_url: Option<String>,
    #[serde(default)]
    pub platform_links: LinkMap,
    #[serde(default)]
    pub review_count: i64,
    #[serde(default)]
    pub likes_count: i64,
}

impl TrackRecord {
    /// Create a track that inherits release date, cover art and owners from `album`
    pub fn on_album(
        id: impl Into<String>,
        title: impl Into<String>,
        length_ms: Option<u64>,
        album: &AlbumRecord,
    ) -> Self {
        let title = title.into();
        Self {
            id: id.into(),
            title_lowercase: title.to_lowercase(),
            title,
            duration_seconds: duration_seconds(length_ms),
            artist_ids: album.artist_ids.clone(),
            album_id: album.id.clone(),
            release_date: album.release_date.clone(),
            genre: None,
            credits: BTreeMap::new(),
            cover_art_url: album.cover_art_url.clone(),
            platform_links: LinkMap::new(),
            review_count: 0,
            likes_count: 0,
        }
    }
}

/// Convert a millisecond length to whole seconds; unknown or zero → 0
pub fn duration_seconds(length_ms: Option<u64>) -> u32 {
    match length_ms {
        Some(ms) if ms > 0 => u32::try_from(ms / 1000).unwrap_or(u32::MAX),
        _ => 0,
    }
}

/// One artist's discography as produced by a single ingestion run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub artist: ArtistRecord,
    #[serde(default)]
    pub albums: Vec<AlbumRecord>,
    #[serde(default)]
    pub tracks: Vec<TrackRecord>,
}

impl Snapshot {
    /// Load a snapshot from a JSON file
    pub fn load(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_seconds() {
        assert_eq!(duration_seconds(Some(215_999)), 215);
        assert_eq!(duration_seconds(Some(1_000)), 1);
        assert_eq!(duration_seconds(Some(999)), 0);
        assert_eq!(duration_seconds(Some(0)), 0);
        assert_eq!(duration_seconds(None), 0);
    }

    #[test]
    fn test_new_records_derive_search_keys() {
        let artist = ArtistRecord::new("mbid-1", "Sigur Rós");
        assert_eq!(artist.name_lowercase, "sigur rós");
        assert!(artist.genres.is_empty());
        assert!(artist.socials.is_empty());

        let album = AlbumRecord::new("rg-1", "Ágætis Byrjun", "mbid-1", Some("1999".into()));
        assert_eq!(album.title_lowercase, "ágætis byrjun");
        assert_eq!(album.artist_ids, vec!["mbid-1".to_string()]);
        assert_eq!(album.review_count, 0);
        assert_eq!(album.likes_count, 0);
    }

    #[test]
    fn test_track_inherits_album_fields() {
        let mut album = AlbumRecord::new("rg-1", "Parachutes", "mbid-1", Some("2000-07-10".into()));
        album.cover_art_url = Some("https://img/cover.jpg".into());

        let track = TrackRecord::on_album("rec-1", "Yellow", Some(266_773), &album);
        assert_eq!(track.duration_seconds, 266);
        assert_eq!(track.album_id, "rg-1");
        assert_eq!(track.release_date.as_deref(), Some("2000-07-10"));
        assert_eq!(track.cover_art_url.as_deref(), Some("https://img/cover.jpg"));
        assert_eq!(track.artist_ids, album.artist_ids);

        album.attach_tracks(&[track]);
        assert_eq!(album.tracklist, vec!["rec-1".to_string()]);
    }

    #[test]
    fn test_snapshot_wire_keys() {
        let artist = ArtistRecord::new("mbid-1", "Coldplay");
        let album = AlbumRecord::new("rg-1", "Parachutes", "mbid-1", None);
        let track = TrackRecord::on_album("rec-1", "Yellow", None, &album);
        let snapshot = Snapshot { artist, albums: vec![album], tracks: vec![track] };

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["artist"]["name_lowercase"], "coldplay");
        assert!(value["artist"]["imageUrl"].is_null());
        assert!(value["artist"]["platformLinks"].is_object());
        assert_eq!(value["albums"][0]["title_lowercase"], "parachutes");
        assert_eq!(value["albums"][0]["likesCount"], 0);
        assert_eq!(value["tracks"][0]["duration"], 0);
        assert_eq!(value["tracks"][0]["albumId"], "rg-1");

        let back: Snapshot = serde_json::from_value(value).unwrap();
        assert_eq!(back, snapshot);
    }
}
