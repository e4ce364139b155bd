//! Key-set providers.
//!
//! A provider resolves the JSON Web Key Set published at a JWKS URL. The
//! remote provider caches sets per URL for a configured TTL and guarantees at
//! most one in-flight fetch per URL: concurrent misses wait on the same fetch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use jsonwebtoken::jwk::JwkSet;
use moka::future::Cache;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use url::Url;

use crate::config::JwksConfig;
use crate::observability::metrics;

/// Why a key set could not be obtained.
#[derive(Debug, Error)]
pub enum KeySetError {
    #[error("refusing to fetch JWKS over plain HTTP from {url}")]
    InsecureUrl { url: Url },

    #[error("failed to fetch JWKS from {url}")]
    Request {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("received error response when fetching JWKS from {url}: {status}")]
    Status { url: Url, status: StatusCode },

    #[error("JWKS from {url} is not a valid key set")]
    Decode {
        url: Url,
        #[source]
        source: reqwest::Error,
    },
}

/// Result of a key-set lookup. Errors are shared between coalesced callers.
pub type KeySetResult = Result<Arc<JwkSet>, Arc<KeySetError>>;

/// Source of signing keys for an issuer.
pub trait KeySetProvider: Send + Sync {
    /// The key set at `jwks_url`, possibly from cache.
    fn key_set<'a>(&'a self, jwks_url: &'a Url) -> BoxFuture<'a, KeySetResult>;

    /// Like [`KeySetProvider::key_set`] but bypasses a cached copy, used when
    /// a token names a key the cached set lacks. Providers may rate-limit this.
    fn refresh<'a>(&'a self, jwks_url: &'a Url) -> BoxFuture<'a, KeySetResult> {
        self.key_set(jwks_url)
    }
}

/// A fixed, locally supplied key set.
#[derive(Debug, Clone)]
pub struct StaticKeySetProvider {
    jwk_set: Arc<JwkSet>,
}

impl StaticKeySetProvider {
    pub fn new(jwk_set: JwkSet) -> Self {
        Self {
            jwk_set: Arc::new(jwk_set),
        }
    }
}

impl KeySetProvider for StaticKeySetProvider {
    fn key_set<'a>(&'a self, _jwks_url: &'a Url) -> BoxFuture<'a, KeySetResult> {
        let jwk_set = Arc::clone(&self.jwk_set);
        async move { Ok(jwk_set) }.boxed()
    }
}

/// Fetches key sets over HTTPS and caches them per URL.
#[derive(Clone)]
pub struct RemoteKeySetProvider {
    http_client: Client,
    cache: Cache<Url, Arc<JwkSet>>,
    forced_refreshes: Arc<DashMap<Url, Instant>>,
    min_refresh_interval: Duration,
}

impl RemoteKeySetProvider {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &JwksConfig) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(config.max_cached_issuers)
            .time_to_live(Duration::from_secs(config.cache_ttl_secs))
            .build();

        Ok(Self {
            http_client,
            cache,
            forced_refreshes: Arc::new(DashMap::new()),
            min_refresh_interval: Duration::from_secs(config.min_refresh_interval_secs),
        })
    }

    async fn fetch(http_client: Client, url: Url) -> Result<Arc<JwkSet>, KeySetError> {
        if url.scheme() != "https" && !is_loopback(&url) {
            return Err(KeySetError::InsecureUrl { url });
        }

        tracing::info!(jwks_url = %url, "Fetching JWKS");

        let response = http_client
            .get(url.clone())
            .header(ACCEPT, "application/json, application/jwk-set+json")
            .send()
            .await
            .map_err(|source| KeySetError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeySetError::Status {
                url,
                status,
            });
        }

        let jwk_set: JwkSet = response
            .json()
            .await
            .map_err(|source| KeySetError::Decode {
                url: url.clone(),
                source,
            })?;

        tracing::debug!(jwks_url = %url, keys = jwk_set.keys.len(), "JWKS fetched");
        Ok(Arc::new(jwk_set))
    }
}

impl KeySetProvider for RemoteKeySetProvider {
    fn key_set<'a>(&'a self, jwks_url: &'a Url) -> BoxFuture<'a, KeySetResult> {
        async move {
            let fetch = {
                let http_client = self.http_client.clone();
                let url = jwks_url.clone();
                async move {
                    let result = Self::fetch(http_client, url).await;
                    metrics::record_jwks_fetch(if result.is_ok() { "ok" } else { "error" });
                    result
                }
            };

            // `try_get_with` runs `fetch` once per key; concurrent callers await it.
            // Errors are handed to every waiter and are not cached.
            self.cache.try_get_with(jwks_url.clone(), fetch).await
        }
        .boxed()
    }

    fn refresh<'a>(&'a self, jwks_url: &'a Url) -> BoxFuture<'a, KeySetResult> {
        async move {
            let now = Instant::now();
            let allowed = match self.forced_refreshes.get(jwks_url) {
                Some(last) => now.duration_since(*last) >= self.min_refresh_interval,
                None => true,
            };

            if allowed {
                self.forced_refreshes.insert(jwks_url.clone(), now);
                self.cache.invalidate(jwks_url).await;
            } else {
                tracing::debug!(jwks_url = %jwks_url, "JWKS refresh rate limited, using cache");
            }

            self.key_set(jwks_url).await
        }
        .boxed()
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(domain)) => domain == "localhost",
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}
