//! Streaming and social link discovery
//!
//! One site-filtered web search per entity. Each result URL lands in at most
//! one bucket, the first URL for a bucket wins, and scanning stops as soon as
//! every bucket the role asks for is filled.

use crate::error::{Enrichment, EnrichmentFailure};
use crate::services::fetcher::RateLimitedFetcher;
use acapella_common::LinkMap;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

const CUSTOM_SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";
const SEARCH_RESULT_COUNT: u32 = 10;

/// Link destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkBucket {
    Spotify,
    AppleMusic,
    YoutubeMusic,
    Instagram,
    Twitter,
}

const STREAMING_BUCKETS: &[LinkBucket] = &[
    LinkBucket::Spotify,
    LinkBucket::AppleMusic,
    LinkBucket::YoutubeMusic,
];

const ALL_BUCKETS: &[LinkBucket] = &[
    LinkBucket::Spotify,
    LinkBucket::AppleMusic,
    LinkBucket::YoutubeMusic,
    LinkBucket::Instagram,
    LinkBucket::Twitter,
];

impl LinkBucket {
    /// Key in the snapshot link maps
    pub fn key(&self) -> &'static str {
        match self {
            LinkBucket::Spotify => "spotify",
            LinkBucket::AppleMusic => "appleMusic",
            LinkBucket::YoutubeMusic => "youtubeMusic",
            LinkBucket::Instagram => "instagram",
            LinkBucket::Twitter => "twitter",
        }
    }

    pub fn is_social(&self) -> bool {
        matches!(self, LinkBucket::Instagram | LinkBucket::Twitter)
    }

    fn domains(&self) -> &'static [&'static str] {
        match self {
            LinkBucket::Spotify => &["open.spotify.com"],
            LinkBucket::AppleMusic => &["music.apple.com"],
            LinkBucket::YoutubeMusic => &["music.youtube.com"],
            LinkBucket::Instagram => &["instagram.com"],
            LinkBucket::Twitter => &["twitter.com", "x.com"],
        }
    }

    fn matches_host(&self, host: &str) -> bool {
        self.domains()
            .iter()
            .any(|domain| {
                host == *domain
                    || host
                        .strip_suffix(*domain)
                        .is_some_and(|rest| rest.ends_with('.'))
            })
    }
}

/// What the search is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkRole {
    Artist,
    Album { artist: String },
    Track { artist: String },
}

impl LinkRole {
    /// Buckets this role fills; social profiles only exist for artists
    pub fn buckets(&self) -> &'static [LinkBucket] {
        match self {
            LinkRole::Artist => ALL_BUCKETS,
            LinkRole::Album { .. } | LinkRole::Track { .. } => STREAMING_BUCKETS,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            LinkRole::Artist => "artist",
            LinkRole::Album { .. } => "album",
            LinkRole::Track { .. } => "track",
        }
    }

    /// Site-filtered query for `name`
    pub fn query(&self, name: &str) -> String {
        let sites = self
            .buckets()
            .iter()
            .flat_map(|bucket| bucket.domains())
            .map(|domain| format!("site:{}", domain))
            .collect::<Vec<_>>()
            .join(" OR ");

        match self {
            LinkRole::Artist => format!("{} \"{}\"", sites, name),
            LinkRole::Album { artist } | LinkRole::Track { artist } => {
                format!("{} \"{}\" \"{}\"", sites, name, artist)
            }
        }
    }
}

/// Classified links for one entity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformLinks {
    /// Streaming platforms
    pub platform: LinkMap,
    /// Social networks (artist role only)
    pub social: LinkMap,
}

impl PlatformLinks {
    pub fn len(&self) -> usize {
        self.platform.len() + self.social.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn has(&self, bucket: LinkBucket) -> bool {
        self.map(bucket).contains_key(bucket.key())
    }

    fn map(&self, bucket: LinkBucket) -> &LinkMap {
        if bucket.is_social() {
            &self.social
        } else {
            &self.platform
        }
    }

    fn insert(&mut self, bucket: LinkBucket, url: &str) {
        let map = if bucket.is_social() {
            &mut self.social
        } else {
            &mut self.platform
        };
        map.entry(bucket.key().to_string())
            .or_insert_with(|| url.to_string());
    }
}

/// Sort result URLs into `buckets`, stopping once all are filled
pub fn classify_urls<I, S>(urls: I, buckets: &[LinkBucket]) -> PlatformLinks
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut links = PlatformLinks::default();
    if buckets.is_empty() {
        return links;
    }

    for url in urls {
        let url = url.as_ref();
        let host = match Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_ascii_lowercase)) {
            Some(host) => host,
            None => continue,
        };

        if let Some(bucket) = buckets
            .iter()
            .copied()
            .find(|bucket| !links.has(*bucket) && bucket.matches_host(&host))
        {
            links.insert(bucket, url);
            if buckets.iter().all(|bucket| links.has(*bucket)) {
                break;
            }
        }
    }

    links
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    link: Option<String>,
}

/// Web-search backed link classifier
pub struct PlatformLinkResolver {
    fetcher: RateLimitedFetcher,
    api_key: Option<String>,
    engine_id: Option<String>,
}

impl PlatformLinkResolver {
    pub fn new(fetcher: RateLimitedFetcher, api_key: Option<String>, engine_id: Option<String>) -> Self {
        Self {
            fetcher,
            api_key,
            engine_id,
        }
    }

    /// Whether search credentials are present
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.engine_id.is_some()
    }

    /// Links for `name` in `role`
    pub async fn classify(&self, name: &str, role: &LinkRole) -> Enrichment<PlatformLinks> {
        let (api_key, engine_id) = match (&self.api_key, &self.engine_id) {
            (Some(key), Some(cx)) => (key.clone(), cx.clone()),
            _ => {
                return Err(EnrichmentFailure::new(
                    "platform links",
                    "web search credentials not configured",
                ))
            }
        };

        let params = [
            ("key", api_key),
            ("cx", engine_id),
            ("q", role.query(name)),
            ("num", SEARCH_RESULT_COUNT.to_string()),
        ];

        let response: SearchResponse = self
            .fetcher
            .get(CUSTOM_SEARCH_URL, &params)
            .await
            .map_err(|e| EnrichmentFailure::new("platform links", e))?;

        let links = classify_urls(
            response.items.iter().filter_map(|item| item.link.as_deref()),
            role.buckets(),
        );

        debug!(name, role = role.label(), found = links.len(), "Classified platform links");

        Ok(links)
    }
}
