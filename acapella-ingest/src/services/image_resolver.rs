//! Artist image resolution
//!
//! Curated source first (TheAudioDB, keyed by MusicBrainz artist id), then a
//! ranked Wikimedia Commons file search for whichever image is still missing.
//!
//! Ranking for the fallback search:
//! 1. Among candidates at least `min_width` wide, the widest
//! 2. Otherwise the largest width × height over all candidates
//! 3. No candidates → absent

use crate::error::{Enrichment, EnrichmentFailure, Settle};
use crate::services::fetcher::RateLimitedFetcher;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// TheAudioDB v1 JSON API with the public test key
const AUDIODB_BASE_URL: &str = "https://www.theaudiodb.com/api/v1/json/2";
const WIKIMEDIA_API_URL: &str = "https://commons.wikimedia.org/w/api.php";

/// Minimum width for a fallback image to be considered high resolution
pub const DEFAULT_MIN_WIDTH: u32 = 1080;

/// Results requested from the fallback search
const FALLBACK_SEARCH_LIMIT: u32 = 20;

/// Images and profile data from the curated source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageSet {
    pub thumb: Option<String>,
    pub banner: Option<String>,
    pub fanart: Option<String>,
    pub fanart2: Option<String>,
    pub biography: Option<String>,
    pub genre: Option<String>,
}

impl ImageSet {
    /// Portrait image
    pub fn profile(&self) -> Option<String> {
        self.thumb.clone()
    }

    /// Wide image: banner, else secondary fanart, else primary fanart
    pub fn cover(&self) -> Option<String> {
        self.banner
            .clone()
            .or_else(|| self.fanart2.clone())
            .or_else(|| self.fanart.clone())
    }
}

#[derive(Debug, Deserialize)]
struct AudioDbResponse {
    #[serde(default)]
    artists: Option<Vec<AudioDbArtist>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AudioDbArtist {
    #[serde(default)]
    str_artist_thumb: Option<String>,
    #[serde(default)]
    str_artist_banner: Option<String>,
    #[serde(default)]
    str_artist_fanart: Option<String>,
    #[serde(default)]
    str_artist_fanart2: Option<String>,
    #[serde(rename = "strBiographyEN", default)]
    str_biography_en: Option<String>,
    #[serde(default)]
    str_genre: Option<String>,
}

impl From<AudioDbArtist> for ImageSet {
    fn from(artist: AudioDbArtist) -> Self {
        Self {
            thumb: non_blank(artist.str_artist_thumb),
            banner: non_blank(artist.str_artist_banner),
            fanart: non_blank(artist.str_artist_fanart),
            fanart2: non_blank(artist.str_artist_fanart2),
            biography: non_blank(artist.str_biography_en),
            genre: non_blank(artist.str_genre),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Fallback search result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ImageCandidate {
    fn area(&self) -> u64 {
        u64::from(self.width.unwrap_or(0)) * u64::from(self.height.unwrap_or(0))
    }
}

/// Pick the best candidate; earlier candidates win ties
pub fn select_best_image(candidates: &[ImageCandidate], min_width: u32) -> Option<&ImageCandidate> {
    // max_by_key keeps the last maximum, so scan in reverse
    let widest_qualified = candidates
        .iter()
        .rev()
        .filter(|c| c.width.is_some_and(|w| w >= min_width))
        .max_by_key(|c| c.width);

    widest_qualified.or_else(|| candidates.iter().rev().max_by_key(|c| c.area()))
}

#[derive(Debug, Deserialize)]
struct WikimediaResponse {
    #[serde(default)]
    query: Option<WikimediaQuery>,
}

#[derive(Debug, Deserialize)]
struct WikimediaQuery {
    #[serde(default)]
    pages: BTreeMap<String, WikimediaPage>,
}

#[derive(Debug, Deserialize)]
struct WikimediaPage {
    #[serde(default)]
    title: Option<String>,
    /// Search rank
    #[serde(default)]
    index: Option<u32>,
    #[serde(default)]
    imageinfo: Vec<WikimediaImageInfo>,
}

#[derive(Debug, Deserialize)]
struct WikimediaImageInfo {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

impl WikimediaResponse {
    /// Candidates in search rank order
    fn into_candidates(self) -> Vec<ImageCandidate> {
        let mut pages: Vec<WikimediaPage> = self
            .query
            .map(|q| q.pages.into_values().collect())
            .unwrap_or_default();
        pages.sort_by_key(|p| p.index.unwrap_or(u32::MAX));

        pages
            .into_iter()
            .filter(|p| p.title.is_some())
            .filter_map(|p| p.imageinfo.into_iter().next())
            .filter_map(|info| {
                let url = non_blank(info.url)?;
                Some(ImageCandidate {
                    url,
                    width: info.width,
                    height: info.height,
                })
            })
            .collect()
    }
}

/// Profile and cover image for one artist, plus curated profile data
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtistImages {
    pub profile: Option<String>,
    pub cover: Option<String>,
    /// Curated record, when the curated source knew the artist
    pub curated: Option<ImageSet>,
}

/// Curated lookup with ranked fallback search
pub struct ImageResolver {
    audiodb: RateLimitedFetcher,
    wikimedia: RateLimitedFetcher,
}

impl ImageResolver {
    pub fn new(audiodb: RateLimitedFetcher, wikimedia: RateLimitedFetcher) -> Self {
        Self { audiodb, wikimedia }
    }

    /// Curated images for an artist id; any failure counts as absent
    pub async fn fetch_curated_images(&self, artist_id: &str) -> Option<ImageSet> {
        let url = format!("{}/artist-mb.php", AUDIODB_BASE_URL);
        let params = [("i", artist_id.to_string())];

        match self.audiodb.get::<AudioDbResponse>(&url, &params).await {
            Ok(response) => response
                .artists
                .and_then(|artists| artists.into_iter().next())
                .map(ImageSet::from),
            Err(e) => {
                warn!(mbid = %artist_id, error = %e, "Curated image lookup failed, treating as absent");
                None
            }
        }
    }

    /// Best fallback image for `query`
    pub async fn search_fallback_image(&self, query: &str, min_width: u32) -> Enrichment<Option<String>> {
        let params = [
            ("action", "query".to_string()),
            ("format", "json".to_string()),
            ("generator", "search".to_string()),
            ("gsrsearch", query.to_string()),
            ("gsrlimit", FALLBACK_SEARCH_LIMIT.to_string()),
            // File namespace
            ("gsrnamespace", "6".to_string()),
            ("prop", "imageinfo".to_string()),
            ("iiprop", "url|size".to_string()),
        ];

        let response: WikimediaResponse = self
            .wikimedia
            .get(WIKIMEDIA_API_URL, &params)
            .await
            .map_err(|e| EnrichmentFailure::new("fallback image", e))?;

        let candidates = response.into_candidates();
        let best = select_best_image(&candidates, min_width).map(|c| c.url.clone());

        debug!(query, candidates = candidates.len(), found = best.is_some(), "Fallback image search");

        Ok(best)
    }

    /// Curated images first, then independent fallbacks for what is missing
    pub async fn resolve(&self, artist_id: &str, artist_name: &str) -> ArtistImages {
        let curated = self.fetch_curated_images(artist_id).await;

        let mut images = ArtistImages {
            profile: curated.as_ref().and_then(ImageSet::profile),
            cover: curated.as_ref().and_then(ImageSet::cover),
            curated,
        };

        if images.profile.is_none() {
            info!(artist = %artist_name, "Searching for profile image fallback");
            images.profile = self
                .search_fallback_image(&format!("{} portrait", artist_name), DEFAULT_MIN_WIDTH)
                .await
                .settle();
        }

        if images.cover.is_none() {
            info!(artist = %artist_name, "Searching for cover image fallback");
            images.cover = self
                .search_fallback_image(&format!("{} banner", artist_name), DEFAULT_MIN_WIDTH)
                .await
                .settle();
        }

        info!(
            artist = %artist_name,
            profile = images.profile.is_some(),
            cover = images.cover.is_some(),
            "Image enrichment finished"
        );

        images
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate(url: &str, width: u32, height: u32) -> ImageCandidate {
        ImageCandidate {
            url: url.to_string(),
            width: Some(width),
            height: Some(height),
        }
    }

    #[test]
    fn test_widest_qualified_candidate_wins() {
        let candidates = vec![
            candidate("a", 2000, 100),
            candidate("b", 1200, 1200),
            candidate("c", 800, 2000),
        ];

        let best = select_best_image(&candidates, 1080).unwrap();
        assert_eq!(best.url, "a");
    }

    #[test]
    fn test_largest_area_when_none_qualify() {
        let candidates = vec![candidate("a", 500, 500), candidate("b", 900, 100)];

        let best = select_best_image(&candidates, 1080).unwrap();
        assert_eq!(best.url, "a");
    }

    #[test]
    fn test_no_candidates_is_absent() {
        assert!(select_best_image(&[], 1080).is_none());
    }

    #[test]
    fn test_missing_dimensions_count_as_zero() {
        let candidates = vec![
            ImageCandidate { url: "nodims".into(), width: None, height: None },
            candidate("small", 10, 10),
        ];

        assert_eq!(select_best_image(&candidates, 1080).unwrap().url, "small");
    }

    #[test]
    fn test_ties_keep_first_candidate() {
        let candidates = vec![candidate("first", 1500, 10), candidate("second", 1500, 20)];
        assert_eq!(select_best_image(&candidates, 1080).unwrap().url, "first");
    }

    #[test]
    fn test_audiodb_cover_preference() {
        let response: AudioDbResponse = serde_json::from_value(json!({
            "artists": [{
                "strArtistThumb": "https://img/thumb.jpg",
                "strArtistBanner": "",
                "strArtistFanart": "https://img/fanart.jpg",
                "strArtistFanart2": null,
                "strBiographyEN": "Formed in London in 1996.",
                "strGenre": "Alternative Rock"
            }]
        }))
        .unwrap();

        let set = ImageSet::from(response.artists.unwrap().remove(0));
        assert_eq!(set.profile().as_deref(), Some("https://img/thumb.jpg"));
        assert_eq!(set.cover().as_deref(), Some("https://img/fanart.jpg"));
        assert_eq!(set.genre.as_deref(), Some("Alternative Rock"));
    }

    #[test]
    fn test_audiodb_unknown_artist() {
        let response: AudioDbResponse = serde_json::from_value(json!({ "artists": null })).unwrap();
        assert!(response.artists.is_none());
    }

    #[test]
    fn test_wikimedia_candidates_follow_search_rank() {
        let response: WikimediaResponse = serde_json::from_value(json!({
            "query": { "pages": {
                "900": { "title": "File:B.jpg", "index": 2, "imageinfo": [{ "url": "https://w/B.jpg", "width": 1200, "height": 800 }] },
                "100": { "title": "File:A.jpg", "index": 1, "imageinfo": [{ "url": "https://w/A.jpg", "width": 1200, "height": 900 }] },
                "500": { "title": "File:C.pdf", "index": 3, "imageinfo": [] }
            }}
        }))
        .unwrap();

        let candidates = response.into_candidates();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].url, "https://w/A.jpg");
        assert_eq!(select_best_image(&candidates, 1080).unwrap().url, "https://w/A.jpg");
    }
}
