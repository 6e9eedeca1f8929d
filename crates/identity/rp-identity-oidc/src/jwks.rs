//! Remote JSON Web Key Set fetching and caching.
//!
//! The authorization server publishes its signing keys at
//! `{auth_host}/.well-known/jwks.json`. [`RemoteKeySet`] fetches that document
//! lazily, caches it for the duration advertised by `Cache-Control: max-age`
//! (clamped to [`KeySetConfig`] bounds) and refetches when a requested key id
//! is missing, so that key rotation on the server side is picked up without a
//! restart.
//!
//! Concurrent refreshes are not deduplicated; the last completed fetch wins.

use crate::config::KeySetConfig;
use crate::error::JwksError;
use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};
use url::Url;

/// A public key usable for signature verification.
#[derive(Clone)]
pub struct ResolvedKey {
    pub kid: Option<String>,
    pub key: DecodingKey,
    /// Algorithm pinned by the JWK's `alg` member, if any.
    pub algorithm: Option<Algorithm>,
}

impl std::fmt::Debug for ResolvedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Resolves key ids to public signing keys.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// Resolve a key id to a public key, or fail.
    async fn resolve(&self, kid: &str) -> Result<ResolvedKey, JwksError>;

    /// All signing keys, for tokens that carry no key id.
    async fn signing_keys(&self) -> Result<Vec<ResolvedKey>, JwksError>;
}

struct CachedJwks {
    jwks: JwkSet,
    expires_at: Instant,
}

/// Process-wide cache of the authorization server's key set.
pub struct RemoteKeySet {
    http_client: reqwest::Client,
    jwks_uri: Url,
    cache: Arc<RwLock<Option<CachedJwks>>>,
    config: KeySetConfig,
}

impl RemoteKeySet {
    pub fn new(http_client: reqwest::Client, jwks_uri: Url, config: KeySetConfig) -> Self {
        Self {
            http_client,
            jwks_uri,
            cache: Arc::new(RwLock::new(None)),
            config,
        }
    }

    pub fn jwks_uri(&self) -> &Url {
        &self.jwks_uri
    }

    async fn cached_key(&self, kid: &str) -> Option<ResolvedKey> {
        let cache = self.cache.read().await;

        cache
            .as_ref()
            .filter(|cached| Instant::now() < cached.expires_at)
            .and_then(|cached| {
                cached
                    .jwks
                    .keys
                    .iter()
                    .filter(|jwk| is_signing_key(jwk))
                    .find(|jwk| jwk.common.key_id.as_deref() == Some(kid))
                    .and_then(to_resolved_key)
            })
    }

    async fn ensure_cached(&self) -> Result<(), JwksError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref()
                && Instant::now() < cached.expires_at
            {
                return Ok(());
            }
        }

        self.refresh().await
    }

    /// Fetch the key set and replace the cached copy.
    pub async fn refresh(&self) -> Result<(), JwksError> {
        debug!("Fetching JWKS from {}", self.jwks_uri);

        let response = self
            .http_client
            .get(self.jwks_uri.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!("Failed to fetch JWKS from {}: {}", self.jwks_uri, e);
                JwksError::NetworkError(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(JwksError::HttpError(response.status().as_u16()));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_response_size
        {
            return Err(JwksError::ResponseTooLarge {
                max_size: self.config.max_response_size,
            });
        }

        let ttl = self.parse_cache_control(response.headers());

        let body = response
            .bytes()
            .await
            .map_err(|e| JwksError::NetworkError(e.to_string()))?;
        if body.len() > self.config.max_response_size {
            return Err(JwksError::ResponseTooLarge {
                max_size: self.config.max_response_size,
            });
        }

        let jwks: JwkSet = serde_json::from_slice(&body).map_err(|e| {
            warn!("Failed to parse JWKS from {}: {}", self.jwks_uri, e);
            JwksError::ParseError(e.to_string())
        })?;

        debug!(
            "Cached JWKS from {} with {} keys, TTL {:?}",
            self.jwks_uri,
            jwks.keys.len(),
            ttl
        );

        let mut cache = self.cache.write().await;
        *cache = Some(CachedJwks {
            jwks,
            expires_at: Instant::now() + ttl,
        });

        Ok(())
    }

    /// Drop the cached key set so the next lookup refetches it.
    pub async fn invalidate(&self) {
        self.cache.write().await.take();
        debug!("Invalidated JWKS cache for {}", self.jwks_uri);
    }

    fn parse_cache_control(&self, headers: &reqwest::header::HeaderMap) -> Duration {
        let ttl = headers
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| {
                v.split(',').find_map(|directive| {
                    directive
                        .trim()
                        .strip_prefix("max-age=")
                        .and_then(|secs| secs.parse::<u64>().ok())
                })
            })
            .map(Duration::from_secs)
            .unwrap_or(self.config.default_ttl);

        ttl.min(self.config.max_ttl).max(self.config.min_ttl)
    }
}

#[async_trait]
impl KeyResolver for RemoteKeySet {
    async fn resolve(&self, kid: &str) -> Result<ResolvedKey, JwksError> {
        if let Some(key) = self.cached_key(kid).await {
            trace!("Cache hit for JWKS key {}", kid);
            return Ok(key);
        }

        debug!("Cache miss for JWKS key {}", kid);
        self.refresh().await?;

        self.cached_key(kid)
            .await
            .ok_or_else(|| JwksError::KeyNotFound(kid.to_string()))
    }

    async fn signing_keys(&self) -> Result<Vec<ResolvedKey>, JwksError> {
        self.ensure_cached().await?;

        let cache = self.cache.read().await;
        let keys: Vec<_> = cache
            .as_ref()
            .map(|cached| {
                cached
                    .jwks
                    .keys
                    .iter()
                    .filter(|jwk| is_signing_key(jwk))
                    .filter_map(to_resolved_key)
                    .collect()
            })
            .unwrap_or_default();

        if keys.is_empty() {
            Err(JwksError::NoSigningKeys)
        } else {
            Ok(keys)
        }
    }
}

fn is_signing_key(jwk: &Jwk) -> bool {
    !matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption))
}

fn to_resolved_key(jwk: &Jwk) -> Option<ResolvedKey> {
    DecodingKey::from_jwk(jwk).ok().map(|key| ResolvedKey {
        kid: jwk.common.key_id.clone(),
        key,
        algorithm: jwk_algorithm(jwk),
    })
}

fn jwk_algorithm(jwk: &Jwk) -> Option<Algorithm> {
    jwk.common.key_algorithm.as_ref().and_then(|alg| match alg {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    })
}
