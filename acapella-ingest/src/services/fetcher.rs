//! Rate-limited, retrying HTTP GET
//!
//! Every call to an external service goes through a [`RateLimitedFetcher`]
//! owned by that service's client. The fetcher:
//! 1. Waits until the service's minimum spacing has elapsed since the last call
//! 2. Issues the GET through an [`HttpTransport`]
//! 3. On `Transient` failure, backs off (base delay, doubling) and tries again,
//!    up to `max_attempts` calls in total
//! 4. Surfaces the final error; `Permanent` failures are returned immediately
//!
//! The throttle clock is per fetcher instance. One aggregator shares its
//! fetchers across all the artists it processes, so spacing holds across runs.

use crate::error::FetchError;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Per-request timeout for rate-limited calls
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Logical external service; each has its own throttle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceTag {
    MusicBrainz,
    AudioDb,
    Wikimedia,
    WebSearch,
}

impl ServiceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceTag::MusicBrainz => "musicbrainz",
            ServiceTag::AudioDb => "theaudiodb",
            ServiceTag::Wikimedia => "wikimedia",
            ServiceTag::WebSearch => "websearch",
        }
    }

    /// Minimum spacing between consecutive calls
    pub fn default_spacing(&self) -> Duration {
        match self {
            // MusicBrainz allows 1 req/s per client; keep a margin
            ServiceTag::MusicBrainz => Duration::from_millis(1500),
            ServiceTag::AudioDb => Duration::from_millis(500),
            ServiceTag::Wikimedia => Duration::from_millis(250),
            ServiceTag::WebSearch => Duration::from_millis(250),
        }
    }
}

impl fmt::Display for ServiceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retry schedule for transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total calls, including the first
    pub max_attempts: u32,
    /// Delay after the first failure; doubled after each further failure
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Backoff after failed attempt `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

/// Throttling and retry settings applied when building fetchers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchPolicy {
    pub retry: RetryPolicy,
    /// Same spacing for every service instead of the per-service defaults
    pub spacing_override: Option<Duration>,
}

impl FetchPolicy {
    pub fn spacing_for(&self, service: ServiceTag) -> Duration {
        self.spacing_override
            .unwrap_or_else(|| service.default_spacing())
    }
}

/// Raw GET returning decoded JSON
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<Value, FetchError>;
}

/// reqwest-backed transport
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FetchError::Permanent {
                status: None,
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    FetchError::Permanent {
                        status: None,
                        message: format!("Invalid request: {}", e),
                    }
                } else {
                    FetchError::Transient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status.as_u16(), body));
        }

        // A body that stops mid-stream is a partial response, so retryable
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transient(format!("Incomplete response body: {}", e)))?;

        serde_json::from_slice(&bytes).map_err(|e| FetchError::Permanent {
            status: Some(status.as_u16()),
            message: format!("Undecodable response body: {}", e),
        })
    }
}

/// Minimum inter-call spacing for one service
pub struct Throttle {
    /// `None` when spacing is zero
    limiter: Option<
        RateLimiter<
            governor::state::direct::NotKeyed,
            governor::state::InMemoryState,
            governor::clock::DefaultClock,
        >,
    >,
}

impl Throttle {
    pub fn new(spacing: Duration) -> Self {
        // Burst of one: the first call passes, each later call waits a full period
        let limiter = Quota::with_period(spacing).map(|quota| RateLimiter::direct(quota));
        Self { limiter }
    }

    /// Block until the next call is allowed
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

/// Throttled, retrying GET for one logical service
pub struct RateLimitedFetcher {
    service: ServiceTag,
    transport: Arc<dyn HttpTransport>,
    throttle: Throttle,
    retry: RetryPolicy,
}

impl RateLimitedFetcher {
    pub fn new(
        service: ServiceTag,
        transport: Arc<dyn HttpTransport>,
        spacing: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            service,
            transport,
            throttle: Throttle::new(spacing),
            retry,
        }
    }

    /// Build a fetcher for `service` using `policy`
    pub fn with_policy(
        service: ServiceTag,
        transport: Arc<dyn HttpTransport>,
        policy: &FetchPolicy,
    ) -> Self {
        Self::new(service, transport, policy.spacing_for(service), policy.retry)
    }

    pub fn service(&self) -> ServiceTag {
        self.service
    }

    /// GET `url` and return the decoded JSON body
    pub async fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<Value, FetchError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.throttle.wait().await;

            debug!(service = %self.service, url, attempt, "GET");

            match self.transport.get_json(url, params).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(service = %self.service, url, attempt, "Request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        service = %self.service,
                        url,
                        attempt,
                        max_attempts,
                        backoff_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient failure, will retry after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if err.is_transient() {
                        error!(
                            service = %self.service,
                            url,
                            attempt,
                            error = %err,
                            "Request failed: retries exhausted"
                        );
                    } else {
                        warn!(service = %self.service, url, error = %err, "Request failed permanently");
                    }
                    return Err(err);
                }
            }
        }
    }

    /// GET `url` and deserialize the body into `T`
    pub async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let value = self.get_json(url, params).await?;
        serde_json::from_value(value).map_err(|e| FetchError::Permanent {
            status: None,
            message: format!("Unexpected {} response shape: {}", self.service, e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    /// Fails with the given errors in order, then succeeds
    struct ScriptedTransport {
        failures: Vec<FetchError>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(failures: Vec<FetchError>) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn get_json(&self, _url: &str, _params: &[(&str, String)]) -> Result<Value, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.failures.get(call) {
                Some(err) => Err(err.clone()),
                None => Ok(serde_json::json!({ "ok": true })),
            }
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    fn transient() -> FetchError {
        FetchError::Transient("connection reset".to_string())
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        };
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
    }

    #[test]
    fn test_default_spacing_per_service() {
        let policy = FetchPolicy::default();
        assert_eq!(policy.spacing_for(ServiceTag::MusicBrainz), Duration::from_millis(1500));

        let policy = FetchPolicy {
            spacing_override: Some(Duration::ZERO),
            ..Default::default()
        };
        assert_eq!(policy.spacing_for(ServiceTag::MusicBrainz), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_transient_failure_then_success() {
        let transport = ScriptedTransport::new(vec![transient(), transient()]);
        let fetcher = RateLimitedFetcher::new(
            ServiceTag::MusicBrainz,
            transport.clone(),
            Duration::ZERO,
            fast_retry(),
        );

        let value = fetcher.get_json("https://example.test", &[]).await.unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_transient_failure_exhausts_retries() {
        let transport = ScriptedTransport::new(vec![transient(), transient(), transient(), transient()]);
        let fetcher = RateLimitedFetcher::new(
            ServiceTag::MusicBrainz,
            transport.clone(),
            Duration::ZERO,
            fast_retry(),
        );

        let err = fetcher.get_json("https://example.test", &[]).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_never_retries() {
        let transport = ScriptedTransport::new(vec![FetchError::from_status(404, "not found")]);
        let fetcher = RateLimitedFetcher::new(
            ServiceTag::AudioDb,
            transport.clone(),
            Duration::ZERO,
            fast_retry(),
        );

        let err = fetcher.get_json("https://example.test", &[]).await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_unexpected_shape_is_permanent() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Needs {
            missing_field: String,
        }

        let transport = ScriptedTransport::new(vec![]);
        let fetcher = RateLimitedFetcher::new(
            ServiceTag::Wikimedia,
            transport.clone(),
            Duration::ZERO,
            fast_retry(),
        );

        let err = fetcher.get::<Needs>("https://example.test", &[]).await.unwrap_err();
        assert!(matches!(err, FetchError::Permanent { status: None, .. }));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_throttle_spacing() {
        let throttle = Throttle::new(Duration::from_millis(200));

        let start = Instant::now();

        // First call - no wait
        throttle.wait().await;
        let first_elapsed = start.elapsed();

        // Second call - should wait ~200ms
        throttle.wait().await;
        let second_elapsed = start.elapsed();

        // Third call - should wait another ~200ms
        throttle.wait().await;
        let third_elapsed = start.elapsed();

        assert!(first_elapsed < Duration::from_millis(100));
        assert!(second_elapsed >= Duration::from_millis(180));
        assert!(third_elapsed >= Duration::from_millis(380));
    }

    #[tokio::test]
    async fn test_fetcher_spaces_consecutive_calls() {
        let transport = ScriptedTransport::new(vec![]);
        let fetcher = RateLimitedFetcher::new(
            ServiceTag::AudioDb,
            transport.clone(),
            Duration::from_millis(100),
            fast_retry(),
        );
        assert_eq!(fetcher.service(), ServiceTag::AudioDb);

        let start = Instant::now();
        fetcher.get_json("https://example.test/a", &[]).await.unwrap();
        let first_elapsed = start.elapsed();
        fetcher.get_json("https://example.test/b", &[]).await.unwrap();
        let second_elapsed = start.elapsed();

        assert!(first_elapsed < Duration::from_millis(50));
        assert!(second_elapsed >= Duration::from_millis(90));
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_zero_spacing_never_waits() {
        let throttle = Throttle::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..10 {
            throttle.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
