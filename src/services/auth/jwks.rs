//! Signing-key resolution backed by the identity provider's JWKS.
//!
//! Refresh policy:
//! - the key set is fetched on first use
//! - a cached set older than `ttl` is refetched on the next lookup
//! - a lookup for an unknown `kid` refetches immediately, but at most once per
//!   `refresh_cooldown`; a rotated key is therefore resolvable no later than
//!   `refresh_cooldown` after the provider publishes it
//! - when a refetch fails, keys from the previous set keep resolving
//!
//! Concurrent refreshes collapse into one fetch: callers queue on an async
//! gate, and whoever finds that another caller already refreshed while it
//! waited reuses that result. The key map itself is never locked across the
//! network fetch.
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::{AlgorithmParameters, JwkSet};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum KeyResolutionError {
    #[error("jwks endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("jwks endpoint returned status {0}")]
    Status(u16),
    #[error("malformed jwks document: {0}")]
    Malformed(String),
    #[error("no signing key for kid {0:?}")]
    UnknownKid(String),
}

/// Source of the published key set.
#[async_trait]
pub trait JwksFetcher: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet, KeyResolutionError>;
}

/// Fetches the key set over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpJwksFetcher {
    client: reqwest::Client,
    url: Url,
}

impl HttpJwksFetcher {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl JwksFetcher for HttpJwksFetcher {
    async fn fetch(&self) -> Result<JwkSet, KeyResolutionError> {
        let resp = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| KeyResolutionError::Unreachable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(KeyResolutionError::Status(resp.status().as_u16()));
        }

        resp.json::<JwkSet>()
            .await
            .map_err(|e| KeyResolutionError::Malformed(e.to_string()))
    }
}

/// A fixed key set, for local development and tests.
#[derive(Debug, Clone)]
pub struct StaticJwks(JwkSet);

impl StaticJwks {
    pub fn new(set: JwkSet) -> Self {
        Self(set)
    }

    pub fn from_json(raw: &str) -> Result<Self, KeyResolutionError> {
        serde_json::from_str(raw)
            .map(Self)
            .map_err(|e| KeyResolutionError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl JwksFetcher for StaticJwks {
    async fn fetch(&self) -> Result<JwkSet, KeyResolutionError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct KeyCachePolicy {
    pub ttl: Duration,
    pub refresh_cooldown: Duration,
}

struct KeySet {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Instant,
}

#[derive(Default)]
struct CacheState {
    current: Option<KeySet>,
    last_attempt: Option<Instant>,
}

/// Read-through cache mapping `kid` to an RSA verification key.
pub struct KeyResolver {
    fetcher: Arc<dyn JwksFetcher>,
    policy: KeyCachePolicy,
    state: RwLock<CacheState>,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for KeyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material is not printed
        f.debug_struct("KeyResolver")
            .field("policy", &self.policy)
            .finish()
    }
}

impl KeyResolver {
    pub fn new(fetcher: Arc<dyn JwksFetcher>, policy: KeyCachePolicy) -> Self {
        Self {
            fetcher,
            policy,
            state: RwLock::new(CacheState::default()),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn resolve(&self, kid: &str) -> Result<DecodingKey, KeyResolutionError> {
        let (cached, may_refresh, observed) = {
            let state = self.read();
            let fresh = state
                .current
                .as_ref()
                .is_some_and(|set| set.fetched_at.elapsed() < self.policy.ttl);
            let cached = state
                .current
                .as_ref()
                .and_then(|set| set.keys.get(kid).cloned());

            if let (true, Some(key)) = (fresh, &cached) {
                return Ok(key.clone());
            }

            let cooling_down = state
                .last_attempt
                .is_some_and(|t| t.elapsed() < self.policy.refresh_cooldown);
            (cached, !cooling_down, state.last_attempt)
        };

        if !may_refresh {
            return cached.ok_or_else(|| KeyResolutionError::UnknownKid(kid.to_string()));
        }

        match self.refresh(kid, observed).await {
            Ok(()) => self
                .lookup(kid)
                .ok_or_else(|| KeyResolutionError::UnknownKid(kid.to_string())),
            Err(err) => match cached {
                Some(key) => {
                    tracing::warn!(error = %err, kid, "jwks refresh failed, serving cached key");
                    Ok(key)
                }
                None => Err(err),
            },
        }
    }

    /// Fetch and install a new key set.
    ///
    /// `observed` is the last attempt the caller saw before deciding to
    /// refresh. If it changed by the time the gate is acquired, or the set
    /// now holds a fresh `kid`, another caller refreshed in between and this
    /// one uses that outcome.
    async fn refresh(
        &self,
        kid: &str,
        observed: Option<Instant>,
    ) -> Result<(), KeyResolutionError> {
        let _gate = self.refresh_gate.lock().await;
        {
            let mut state = self.write();
            let already_fresh = state.current.as_ref().is_some_and(|set| {
                set.fetched_at.elapsed() < self.policy.ttl && set.keys.contains_key(kid)
            });
            if state.last_attempt != observed || already_fresh {
                return Ok(());
            }
            state.last_attempt = Some(Instant::now());
        }

        let set = self.fetcher.fetch().await.inspect_err(|err| {
            tracing::warn!(error = %err, "jwks fetch failed");
        })?;
        let keys = usable_keys(&set)?;

        tracing::info!(keys = keys.len(), "jwks refreshed");
        self.write().current = Some(KeySet {
            keys,
            fetched_at: Instant::now(),
        });
        Ok(())
    }

    fn lookup(&self, kid: &str) -> Option<DecodingKey> {
        self.read()
            .current
            .as_ref()
            .and_then(|set| set.keys.get(kid).cloned())
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Keep RSA keys that carry a `kid`; skip everything else.
fn usable_keys(set: &JwkSet) -> Result<HashMap<String, DecodingKey>, KeyResolutionError> {
    let mut keys = HashMap::new();

    for jwk in &set.keys {
        let Some(kid) = jwk.common.key_id.as_deref() else {
            continue;
        };
        if !matches!(jwk.algorithm, AlgorithmParameters::RSA(_)) {
            tracing::debug!(kid, "skipping non-RSA jwk");
            continue;
        }
        match DecodingKey::from_jwk(jwk) {
            Ok(key) => {
                keys.insert(kid.to_string(), key);
            }
            Err(err) => tracing::warn!(error = %err, kid, "skipping unusable jwk"),
        }
    }

    if keys.is_empty() {
        return Err(KeyResolutionError::Malformed(
            "no usable RSA signing keys".to_string(),
        ));
    }
    Ok(keys)
}
