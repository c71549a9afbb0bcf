//! Geocoding resolver
//!
//! Turns a raw address into coordinates. The [`GeocodeCache`] is consulted
//! first; only a miss (or an entry whose precision is not good enough) reaches
//! the [`GeocodeProvider`]. Transient provider failures are retried with a
//! linear backoff; a no-match answer is final.
//!
//! ## Retry schedule
//!
//! ```text
//! attempt:  1    2    3    4    5
//! wait:       0s   1s   2s   3s      then give up
//! ```

pub mod google;

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::GeocodeCache;
use crate::models::Coordinates;

pub use google::{GoogleGeocoder, GOOGLE_GEOCODE_URL};

/// Precision threshold used when none is configured. Accepts almost any cached entry.
pub const DEFAULT_PRECISION_METERS: f64 = 999_999.0;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum GeocodeError {
    /// The provider understood the request and found nothing. Never retried.
    #[error("no geocoding results for {address}")]
    NoMatch { address: String },

    #[error("geocoding request failed: {0}")]
    Request(String),

    #[error("geocoding provider returned {status}: {body}")]
    Status { status: String, body: String },

    #[error("undecodable geocoding response: {0}")]
    Decode(String),

    #[error("geocoding failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: Box<GeocodeError>,
    },
}

impl GeocodeError {
    pub fn is_no_match(&self) -> bool {
        matches!(self, GeocodeError::NoMatch { .. })
    }

    /// Worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GeocodeError::Request(_) | GeocodeError::Status { .. } | GeocodeError::Decode(_)
        )
    }
}

// =============================================================================
// Seams
// =============================================================================

/// An external address lookup service.
#[allow(async_fn_in_trait)]
pub trait GeocodeProvider {
    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodeError>;
}

/// Source of backoff delays.
#[allow(async_fn_in_trait)]
pub trait Sleeper {
    async fn sleep(&self, duration: Duration);
}

/// Real timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// =============================================================================
// Retry Policy
// =============================================================================

/// Linear backoff: the wait after failed attempt `n` is `step * (n - 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            step: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt that follows failed attempt `attempt` (1-indexed).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.step * attempt.saturating_sub(1)
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Cache-first resolver with retry.
#[derive(Debug, Clone)]
pub struct Geocoder<P, S = TokioSleeper> {
    provider: P,
    sleeper: S,
    precision_meters: f64,
    retry: RetryPolicy,
}

impl<P: GeocodeProvider> Geocoder<P> {
    pub fn new(provider: P, precision_meters: f64) -> Self {
        Self::with_sleeper(provider, TokioSleeper, precision_meters)
    }
}

impl<P: GeocodeProvider, S: Sleeper> Geocoder<P, S> {
    pub fn with_sleeper(provider: P, sleeper: S, precision_meters: f64) -> Self {
        Self {
            provider,
            sleeper,
            precision_meters,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    pub fn precision_meters(&self) -> f64 {
        self.precision_meters
    }

    /// One lookup: cache within threshold, else the provider.
    ///
    /// A provider hit is stored in the cache with precision 0.
    pub async fn lookup(&self, cache: &GeocodeCache, address: &str) -> Result<Coordinates, GeocodeError> {
        if let Some(coords) = cache.lookup_within(address, self.precision_meters) {
            debug!(address, "geocode cache hit");
            return Ok(coords);
        }

        let coords = self.provider.geocode(address).await?;
        cache.record_resolution(address, coords);
        Ok(coords)
    }

    /// Resolve with retry. The cache is re-consulted on every attempt.
    pub async fn resolve(&self, cache: &GeocodeCache, address: &str) -> Result<Coordinates, GeocodeError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let err = match self.lookup(cache, address).await {
                Ok(coords) => return Ok(coords),
                Err(err) if err.is_no_match() => return Err(err),
                Err(err) => err,
            };

            if attempt >= max_attempts {
                return Err(GeocodeError::Exhausted {
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            let delay = self.retry.delay_after(attempt);
            warn!(
                address,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "geocoding attempt failed, retrying"
            );
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheEntry;
    use crate::test_support::{RecordingSleeper, ScriptedProvider};

    const ADDR: &str = "臺北市大安區復興南路一段390號";

    fn transient() -> GeocodeError {
        GeocodeError::Status {
            status: "OVER_QUERY_LIMIT".into(),
            body: String::new(),
        }
    }

    fn geocoder(provider: ScriptedProvider, precision: f64) -> Geocoder<ScriptedProvider, RecordingSleeper> {
        Geocoder::with_sleeper(provider, RecordingSleeper::default(), precision)
    }

    #[test]
    fn test_linear_backoff_schedule() {
        let policy = RetryPolicy::default();
        let delays: Vec<_> = (1..policy.max_attempts).map(|a| policy.delay_after(a)).collect();
        assert_eq!(
            delays,
            [0, 1, 2, 3].map(Duration::from_secs).to_vec()
        );
    }

    #[tokio::test]
    async fn test_cached_within_threshold_skips_provider() {
        let cache = GeocodeCache::new();
        cache.insert(ADDR, CacheEntry { lat: 25.03, lng: 121.54, precision: 10.0 });
        let geo = geocoder(ScriptedProvider::default(), 100.0);

        let coords = geo.resolve(&cache, ADDR).await.unwrap();
        assert_eq!(coords, Coordinates::new(25.03, 121.54));
        assert_eq!(geo.provider().calls(), 0);
    }

    #[tokio::test]
    async fn test_cached_outside_threshold_calls_provider_once() {
        let cache = GeocodeCache::new();
        cache.insert(ADDR, CacheEntry { lat: 25.0, lng: 121.0, precision: 5000.0 });
        let provider = ScriptedProvider::default().then_ok(Coordinates::new(25.033, 121.543));
        let geo = geocoder(provider, 100.0);

        let coords = geo.resolve(&cache, ADDR).await.unwrap();
        assert_eq!(coords, Coordinates::new(25.033, 121.543));
        assert_eq!(geo.provider().calls(), 1);
        assert_eq!(cache.get(ADDR).unwrap().precision, 0.0);

        // Now cached at precision 0.
        geo.resolve(&cache, ADDR).await.unwrap();
        assert_eq!(geo.provider().calls(), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_then_success() {
        let provider = ScriptedProvider::default()
            .then_err(transient())
            .then_err(GeocodeError::Request("connection reset".into()))
            .then_err(GeocodeError::Decode("eof".into()))
            .then_err(transient())
            .then_ok(Coordinates::new(1.0, 2.0));
        let geo = geocoder(provider, 100.0);
        let cache = GeocodeCache::new();

        let coords = geo.resolve(&cache, ADDR).await.unwrap();
        assert_eq!(coords, Coordinates::new(1.0, 2.0));
        assert_eq!(geo.provider().calls(), 5);
        assert_eq!(
            geo.sleeper().delays(),
            [0, 1, 2, 3].map(Duration::from_secs).to_vec()
        );
    }

    #[tokio::test]
    async fn test_no_match_not_retried() {
        let provider = ScriptedProvider::default().then_err(GeocodeError::NoMatch {
            address: ADDR.into(),
        });
        let geo = geocoder(provider, 100.0);
        let cache = GeocodeCache::new();

        let err = geo.resolve(&cache, ADDR).await.unwrap_err();
        assert!(err.is_no_match());
        assert_eq!(geo.provider().calls(), 1);
        assert!(geo.sleeper().delays().is_empty());
        assert!(cache.get(ADDR).is_none());
    }

    #[tokio::test]
    async fn test_exhausted_after_five_attempts() {
        let mut provider = ScriptedProvider::default();
        for _ in 0..5 {
            provider = provider.then_err(transient());
        }
        let geo = geocoder(provider, 100.0);

        let err = geo.resolve(&GeocodeCache::new(), ADDR).await.unwrap_err();
        match err {
            GeocodeError::Exhausted { attempts, source } => {
                assert_eq!(attempts, 5);
                assert!(source.is_transient());
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert_eq!(geo.provider().calls(), 5);
        assert_eq!(geo.sleeper().delays().len(), 4);
    }

    /// Fails every call, but resolves the address in the shared cache first,
    /// as a concurrent row would while this one backs off.
    struct ResolvedElsewhere<'a> {
        cache: &'a GeocodeCache,
        calls: std::sync::atomic::AtomicUsize,
    }

    impl GeocodeProvider for ResolvedElsewhere<'_> {
        async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodeError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.cache.record_resolution(address, Coordinates::new(3.0, 4.0));
            Err(transient())
        }
    }

    #[tokio::test]
    async fn test_cache_reconsulted_between_attempts() {
        let cache = GeocodeCache::new();
        let provider = ResolvedElsewhere {
            cache: &cache,
            calls: Default::default(),
        };
        let geo = Geocoder::with_sleeper(provider, RecordingSleeper::default(), 100.0);

        let coords = geo.resolve(&cache, ADDR).await.unwrap();
        assert_eq!(coords, Coordinates::new(3.0, 4.0));
        assert_eq!(geo.provider().calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(geo.sleeper().delays(), vec![Duration::from_secs(0)]);
    }

    #[test]
    fn test_error_classification() {
        assert!(transient().is_transient());
        assert!(!GeocodeError::NoMatch { address: ADDR.into() }.is_transient());
        let exhausted = GeocodeError::Exhausted {
            attempts: 5,
            source: Box::new(transient()),
        };
        assert!(!exhausted.is_transient());
        assert!(exhausted.to_string().contains("5 attempts"));
    }
}
