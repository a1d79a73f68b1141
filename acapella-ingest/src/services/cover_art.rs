//! Cover Art Archive probe
//!
//! Release-keyed front cover lookup. This is an optional, non-rate-sensitive
//! call, so it bypasses the rate-limited fetcher: one request with a short
//! fixed timeout, and any failure means "no cover".

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

const COVER_ART_ARCHIVE_URL: &str = "https://coverartarchive.org";

/// Fixed timeout for the probe
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Front cover lookup by release id
#[async_trait]
pub trait CoverArtProbe: Send + Sync {
    /// Resolved image URL, or `None` on absence or any error
    async fn front_cover(&self, release_id: &str) -> Option<String>;
}

/// Cover Art Archive client
pub struct CoverArtArchive {
    client: Option<Client>,
}

impl CoverArtArchive {
    pub fn new(user_agent: &str) -> Self {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| debug!("Cover art probe disabled: {}", e))
            .ok();

        Self { client }
    }
}

#[async_trait]
impl CoverArtProbe for CoverArtArchive {
    async fn front_cover(&self, release_id: &str) -> Option<String> {
        let client = self.client.as_ref()?;
        let url = format!("{}/release/{}/front", COVER_ART_ARCHIVE_URL, release_id);

        match client.get(&url).send().await {
            // Redirects are followed; the final URL is the image itself
            Ok(response) if response.status() == StatusCode::OK => {
                Some(response.url().to_string())
            }
            Ok(response) => {
                debug!(release_id, status = %response.status(), "No front cover");
                None
            }
            Err(e) => {
                debug!(release_id, error = %e, "Cover art probe failed");
                None
            }
        }
    }
}
