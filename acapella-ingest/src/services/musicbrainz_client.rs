//! MusicBrainz API client
//!
//! Artist identity, discography (release groups) and track listings.
//! All calls go through the MusicBrainz rate-limited fetcher.
//!
//! API Documentation: https://musicbrainz.org/doc/MusicBrainz_API

use crate::error::FetchError;
use crate::services::fetcher::RateLimitedFetcher;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const MUSICBRAINZ_BASE_URL: &str = "https://musicbrainz.org/ws/2";

/// Best search match for an artist name
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Identity {
    /// Artist MBID
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct ArtistSearchResponse {
    #[serde(default)]
    artists: Vec<Identity>,
}

/// Artist lookup with release groups and genres
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtistDetail {
    pub id: String,
    pub name: String,
    /// Short distinguishing comment ("UK rock band")
    #[serde(default)]
    pub disambiguation: Option<String>,
    #[serde(rename = "release-groups", default)]
    pub release_groups: Vec<ReleaseGroup>,
    #[serde(default)]
    pub genres: Vec<MBGenre>,
}

impl ArtistDetail {
    /// Disambiguation comment, if non-blank
    pub fn disambiguation(&self) -> Option<&str> {
        self.disambiguation
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    /// Genre names in source order
    pub fn genre_names(&self) -> Vec<String> {
        self.genres.iter().map(|g| g.name.clone()).collect()
    }
}

/// MusicBrainz genre tag
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBGenre {
    pub name: String,
}

/// One logical album
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReleaseGroup {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "first-release-date", default)]
    pub first_release_date: Option<String>,
}

impl ReleaseGroup {
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or("Unknown")
    }

    /// Release date, if the source gave one
    pub fn release_date(&self) -> Option<String> {
        self.first_release_date.clone().filter(|d| !d.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseGroupResponse {
    #[serde(default)]
    releases: Vec<Release>,
}

/// One edition of a release group
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Release {
    pub id: String,
}

/// Release with its full media/track listing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReleaseDetail {
    pub id: String,
    #[serde(default)]
    pub media: Vec<Medium>,
}

impl ReleaseDetail {
    /// All tracks in medium/track order
    pub fn tracks(&self) -> impl Iterator<Item = &MBTrack> {
        self.media.iter().flat_map(|medium| medium.tracks.iter())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Medium {
    #[serde(default)]
    pub tracks: Vec<MBTrack>,
}

/// Track on a medium
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBTrack {
    #[serde(default)]
    pub title: Option<String>,
    /// Length in milliseconds
    #[serde(default)]
    pub length: Option<u64>,
    #[serde(default)]
    pub recording: Option<MBRecording>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBRecording {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub length: Option<u64>,
}

impl MBTrack {
    pub fn recording_id(&self) -> Option<&str> {
        self.recording
            .as_ref()
            .map(|r| r.id.as_str())
            .filter(|id| !id.is_empty())
    }

    /// Track title, else recording title, else empty
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| {
                self.recording
                    .as_ref()
                    .and_then(|r| r.title.as_deref())
                    .filter(|t| !t.is_empty())
            })
            .unwrap_or("")
    }

    /// Track length, else recording length
    pub fn length_ms(&self) -> Option<u64> {
        self.length
            .filter(|ms| *ms > 0)
            .or_else(|| self.recording.as_ref().and_then(|r| r.length))
    }
}

/// MusicBrainz WS/2 client
pub struct MusicBrainzSource {
    fetcher: RateLimitedFetcher,
}

impl MusicBrainzSource {
    pub fn new(fetcher: RateLimitedFetcher) -> Self {
        Self { fetcher }
    }

    /// First-ranked artist search match, `None` when the search is empty
    pub async fn resolve_identity(&self, name: &str) -> Result<Option<Identity>, FetchError> {
        let url = format!("{}/artist/", MUSICBRAINZ_BASE_URL);
        let params = [
            ("query", format!("artist:{}", name)),
            ("fmt", "json".to_string()),
            ("limit", "1".to_string()),
        ];

        let response: ArtistSearchResponse = self.fetcher.get(&url, &params).await?;
        let identity = response.artists.into_iter().next();

        match &identity {
            Some(found) => info!(query = %name, mbid = %found.id, name = %found.name, "Resolved artist identity"),
            None => info!(query = %name, "No MusicBrainz artist matched"),
        }

        Ok(identity)
    }

    /// Artist with release groups and genres
    pub async fn fetch_discography(&self, artist_id: &str) -> Result<ArtistDetail, FetchError> {
        let url = format!("{}/artist/{}", MUSICBRAINZ_BASE_URL, artist_id);
        let params = [
            ("fmt", "json".to_string()),
            ("inc", "url-rels+release-groups+genres".to_string()),
        ];

        let detail: ArtistDetail = self.fetcher.get(&url, &params).await?;

        info!(
            mbid = %artist_id,
            release_groups = detail.release_groups.len(),
            "Retrieved discography from MusicBrainz"
        );

        Ok(detail)
    }

    /// Releases of a release group in source order
    pub async fn fetch_album_releases(&self, release_group_id: &str) -> Result<Vec<Release>, FetchError> {
        let url = format!("{}/release-group/{}", MUSICBRAINZ_BASE_URL, release_group_id);
        let params = [
            ("fmt", "json".to_string()),
            ("inc", "releases".to_string()),
        ];

        let response: ReleaseGroupResponse = self.fetcher.get(&url, &params).await?;
        debug!(release_group_id, releases = response.releases.len(), "Retrieved releases");

        Ok(response.releases)
    }

    /// Full media/track listing of a release
    pub async fn fetch_release_detail(&self, release_id: &str) -> Result<ReleaseDetail, FetchError> {
        let url = format!("{}/release/{}", MUSICBRAINZ_BASE_URL, release_id);
        let params = [
            ("fmt", "json".to_string()),
            ("inc", "recordings+artist-credits".to_string()),
        ];

        let detail: ReleaseDetail = self.fetcher.get(&url, &params).await?;
        debug!(release_id, tracks = detail.tracks().count(), "Retrieved release detail");

        Ok(detail)
    }
}
