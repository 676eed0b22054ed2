use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::DecodingKey;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use super::AuthError;

/// Source of token verification keys, addressed by key id (`kid`)
#[async_trait]
pub trait KeySource: fmt::Debug + Send + Sync {
    async fn key(&self, kid: &str) -> Result<DecodingKey, AuthError>;
}

/// Turn a published key set into decoding keys. Keys without a `kid` or with
/// unsupported parameters are skipped.
pub fn decoding_keys(set: &JwkSet) -> HashMap<String, DecodingKey> {
    let mut keys = HashMap::new();
    for jwk in &set.keys {
        let Some(kid) = jwk.common.key_id.clone() else {
            warn!("Skipping signing key without a key id");
            continue;
        };
        match DecodingKey::from_jwk(jwk) {
            Ok(key) => {
                keys.insert(kid, key);
            }
            Err(e) => warn!("Skipping unusable signing key {}: {}", kid, e),
        }
    }
    keys
}

/// Fixed key set, loaded once
pub struct StaticKeys {
    keys: HashMap<String, DecodingKey>,
}

impl StaticKeys {
    pub fn new(set: &JwkSet) -> Self {
        Self { keys: decoding_keys(set) }
    }
}

impl fmt::Debug for StaticKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticKeys")
            .field("kids", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl KeySource for StaticKeys {
    async fn key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        self.keys.get(kid).cloned().ok_or(AuthError::UnknownKey)
    }
}

/// Lower bound between two fetches of the key set
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Default)]
struct CachedKeys {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Option<Instant>,
    attempted_at: Option<Instant>,
}

impl CachedKeys {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.is_some_and(|at| at.elapsed() < ttl)
    }

    fn attempted_within(&self, interval: Duration) -> bool {
        self.attempted_at.is_some_and(|at| at.elapsed() < interval)
    }
}

/// Issuer's JWKS endpoint with a short-lived in-memory copy.
///
/// A lookup that misses (stale copy or unknown `kid`) refetches the set, at
/// most once per refresh interval. When a refetch fails the stale key is
/// served if there is one. Concurrent refreshes may race; the last one to
/// finish wins.
pub struct JwksCache {
    url: Url,
    ttl: Duration,
    refresh_interval: Duration,
    client: reqwest::Client,
    cached: RwLock<CachedKeys>,
}

impl JwksCache {
    pub fn new(url: Url, ttl: Duration) -> Self {
        Self {
            url,
            ttl,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            client: reqwest::Client::new(),
            cached: RwLock::new(CachedKeys::default()),
        }
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    async fn fetch(&self) -> Result<HashMap<String, DecodingKey>, AuthError> {
        debug!("Fetching signing keys from {}", self.url);

        let set = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AuthError::KeySource(e.to_string()))?
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::KeySource(e.to_string()))?;

        let keys = decoding_keys(&set);
        info!("Fetched {} signing keys from {}", keys.len(), self.url);
        Ok(keys)
    }
}

impl fmt::Debug for JwksCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwksCache")
            .field("url", &self.url.as_str())
            .field("ttl", &self.ttl)
            .field("refresh_interval", &self.refresh_interval)
            .finish()
    }
}

#[async_trait]
impl KeySource for JwksCache {
    async fn key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        let (known, loaded, fresh, throttled) = {
            let cached = self.cached.read().await;
            (
                cached.keys.get(kid).cloned(),
                cached.fetched_at.is_some(),
                cached.is_fresh(self.ttl),
                cached.attempted_within(self.refresh_interval),
            )
        };

        if (fresh && known.is_some()) || throttled {
            return match known {
                Some(key) => Ok(key),
                None if loaded => Err(AuthError::UnknownKey),
                None => Err(AuthError::KeySource("signing keys are not loaded".to_string())),
            };
        }

        // No lock is held across the network fetch
        let fetched = self.fetch().await;
        let mut cached = self.cached.write().await;
        cached.attempted_at = Some(Instant::now());

        match fetched {
            Ok(keys) => {
                let key = keys.get(kid).cloned();
                cached.keys = keys;
                cached.fetched_at = Some(Instant::now());
                key.ok_or(AuthError::UnknownKey)
            }
            Err(e) => match known {
                Some(key) => {
                    warn!("Serving stale signing key {}: {}", kid, e);
                    Ok(key)
                }
                None => Err(e),
            },
        }
    }
}
