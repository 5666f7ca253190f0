use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::info;

use super::error::AuthError;

const DEFAULT_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<Jwk>,
}

/// One published RSA signing key, kept as its JWKS components.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    pub kid: String,
    pub kty: String,
    pub n: String,
    pub e: String,
}

struct CacheState {
    keys: HashMap<String, Jwk>,
    fetched_at: Option<Instant>,
}

impl CacheState {
    fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        self.fetched_at
            .map(|at| now.duration_since(at) < ttl)
            .unwrap_or(false)
    }
}

/// Time-boxed cache of the identity provider's published signing keys.
/// The refresh runs while the cache lock is held, so concurrent misses
/// wait on one in-flight fetch instead of each hitting the provider.
pub struct KeyCache {
    client: reqwest::Client,
    jwks_url: String,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl KeyCache {
    pub fn new(domain: &str) -> Self {
        let jwks_url = format!(
            "https://{}/.well-known/jwks.json",
            domain.trim_matches('/')
        );
        Self {
            client: reqwest::Client::new(),
            jwks_url,
            ttl: DEFAULT_TTL,
            state: Mutex::new(CacheState {
                keys: HashMap::new(),
                fetched_at: None,
            }),
        }
    }

    /// Returns the key for `kid`, refreshing the cache when it is stale.
    /// An unknown kid after a fresh fetch is `None`, not an error.
    pub async fn get(&self, kid: &str) -> Result<Option<Jwk>, AuthError> {
        let mut state = self.state.lock().await;
        if !state.is_fresh(self.ttl, Instant::now()) {
            let document = self.fetch().await?;
            state.keys = document
                .keys
                .into_iter()
                .map(|k| (k.kid.clone(), k))
                .collect();
            state.fetched_at = Some(Instant::now());
            info!(
                "Refreshed {} signing keys from {}",
                state.keys.len(),
                self.jwks_url
            );
        }
        Ok(state.keys.get(kid).cloned())
    }

    async fn fetch(&self) -> Result<JwksDocument, AuthError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::KeyFetch(format!(
                "jwks endpoint returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cache_is_stale() {
        let state = CacheState {
            keys: HashMap::new(),
            fetched_at: None,
        };
        assert!(!state.is_fresh(DEFAULT_TTL, Instant::now()));
    }

    #[test]
    fn cache_expires_after_ttl() {
        let fetched = Instant::now();
        let state = CacheState {
            keys: HashMap::new(),
            fetched_at: Some(fetched),
        };
        let ttl = Duration::from_secs(600);
        assert!(state.is_fresh(ttl, fetched + Duration::from_secs(599)));
        assert!(!state.is_fresh(ttl, fetched + Duration::from_secs(600)));
    }

    #[test]
    fn jwks_document_parses_provider_shape() {
        let raw = r#"{
            "keys": [
                {"kid": "key-1", "kty": "RSA", "alg": "RS256", "use": "sig", "n": "abc", "e": "AQAB"},
                {"kid": "key-2", "kty": "RSA", "n": "def", "e": "AQAB"}
            ]
        }"#;
        let document: JwksDocument = serde_json::from_str(raw).unwrap();
        assert_eq!(document.keys.len(), 2);
        assert_eq!(document.keys[0].kid, "key-1");
        assert_eq!(document.keys[1].e, "AQAB");
    }
}
