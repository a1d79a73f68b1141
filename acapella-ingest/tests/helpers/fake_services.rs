//! Fake external services
//!
//! `FakeTransport` answers by exact URL (query parameters ignored) and
//! records every call, so tests can assert on retries and on which services
//! were consulted.

use acapella_common::config::IngestConfig;
use acapella_ingest::services::{CoverArtProbe, FetchPolicy, HttpTransport, RetryPolicy};
use acapella_ingest::FetchError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const MB_BASE: &str = "https://musicbrainz.org/ws/2";
pub const MB_ARTIST_SEARCH_URL: &str = "https://musicbrainz.org/ws/2/artist/";
pub const AUDIODB_URL: &str = "https://www.theaudiodb.com/api/v1/json/2/artist-mb.php";
pub const WIKIMEDIA_URL: &str = "https://commons.wikimedia.org/w/api.php";
pub const SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";

/// URL-routed transport with a call log
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<String, Result<Value, FetchError>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer `url` with `body`
    pub fn respond(&self, url: &str, body: Value) {
        self.routes.lock().unwrap().insert(url.to_string(), Ok(body));
    }

    /// Fail every call to `url` with `error`
    pub fn fail(&self, url: &str, error: FetchError) {
        self.routes.lock().unwrap().insert(url.to_string(), Err(error));
    }

    /// Calls made to `url`
    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| u.as_str() == url).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn get_json(&self, url: &str, _params: &[(&str, String)]) -> Result<Value, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.routes
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::from_status(404, format!("no route for {}", url))))
    }
}

/// Cover probe backed by a release id → URL map
#[derive(Default)]
pub struct FakeCoverArt {
    covers: HashMap<String, String>,
}

impl FakeCoverArt {
    pub fn with_cover(mut self, release_id: &str, url: &str) -> Self {
        self.covers.insert(release_id.to_string(), url.to_string());
        self
    }
}

#[async_trait]
impl CoverArtProbe for FakeCoverArt {
    async fn front_cover(&self, release_id: &str) -> Option<String> {
        self.covers.get(release_id).cloned()
    }
}

/// No spacing, millisecond backoff, three attempts
pub fn fast_policy() -> FetchPolicy {
    FetchPolicy {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        },
        spacing_override: Some(Duration::ZERO),
    }
}

/// Config writing into `dir`, web search disabled
pub fn test_config(dir: &Path) -> IngestConfig {
    IngestConfig {
        output_dir: dir.join("fetched"),
        database_path: dir.join("acapella.db"),
        user_agent: "acapella-tests/0.1".to_string(),
        search_api_key: None,
        search_engine_id: None,
        enrich_track_links: false,
        import_concurrency: 2,
    }
}

/// Coldplay: two release groups; release 1 has 10 tracks, release 2 always
/// fails transiently
pub fn coldplay_fixture(transport: &FakeTransport) {
    transport.respond(
        MB_ARTIST_SEARCH_URL,
        json!({ "artists": [{ "id": "MBID-1", "name": "Coldplay", "score": 100 }] }),
    );

    transport.respond(
        &format!("{}/artist/MBID-1", MB_BASE),
        json!({
            "id": "MBID-1",
            "name": "Coldplay",
            "disambiguation": "UK rock band",
            "genres": [{ "name": "alternative rock" }, { "name": "pop rock" }],
            "release-groups": [
                { "id": "rg-1", "title": "Parachutes", "first-release-date": "2000-07-10", "primary-type": "Album" },
                { "id": "rg-2", "title": "A Rush of Blood to the Head", "first-release-date": "2002-08-26", "primary-type": "Album" }
            ]
        }),
    );

    transport.respond(
        &format!("{}/release-group/rg-1", MB_BASE),
        json!({ "releases": [{ "id": "rel-1", "title": "Parachutes" }, { "id": "rel-1b" }] }),
    );
    transport.respond(
        &format!("{}/release-group/rg-2", MB_BASE),
        json!({ "releases": [{ "id": "rel-2", "title": "A Rush of Blood to the Head" }] }),
    );

    let tracks: Vec<Value> = (1..=10)
        .map(|n| {
            json!({
                "title": format!("Track {}", n),
                "length": 200_000 + n * 1_500,
                "recording": { "id": format!("rec-{}", n), "title": format!("Track {}", n) }
            })
        })
        .collect();
    transport.respond(
        &format!("{}/release/rel-1", MB_BASE),
        json!({ "id": "rel-1", "media": [{ "position": 1, "tracks": tracks }] }),
    );
    transport.fail(
        &format!("{}/release/rel-2", MB_BASE),
        FetchError::Transient("connection reset by peer".to_string()),
    );

    transport.respond(
        AUDIODB_URL,
        json!({ "artists": [{
            "strArtistThumb": "https://audiodb/coldplay-thumb.jpg",
            "strArtistBanner": "https://audiodb/coldplay-banner.jpg",
            "strArtistFanart": "https://audiodb/coldplay-fanart.jpg",
            "strBiographyEN": "Coldplay are a British rock band formed in London in 1996.",
            "strGenre": "Rock"
        }] }),
    );
}
