use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use tokio::sync::Mutex;
use tracing::debug;

use super::error::AuthError;
use super::keycache::KeyCache;
use super::types::{Claims, Identity};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

const REQUESTS_PER_MINUTE: u32 = 60;

pub struct Auth {
    keys: KeyCache,
    audience: String,
    issuer: String,
    rate_limiters: Arc<Mutex<HashMap<String, Arc<DirectRateLimiter>>>>,
}

impl Auth {
    pub fn new(domain: &str, audience: &str) -> Self {
        Self {
            keys: KeyCache::new(domain),
            audience: audience.to_string(),
            issuer: format!("https://{}/", domain.trim_matches('/')),
            rate_limiters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Validates the Authorization header and returns the caller identity.
    /// Every token defect (missing, malformed, expired signature, wrong
    /// audience or issuer, unknown signing key) is an `AuthError`; the
    /// identity provider being unreachable is `KeyFetch`.
    pub async fn verify(&self, authorization: Option<&str>) -> Result<Identity, AuthError> {
        let token = bearer_token(authorization).ok_or(AuthError::MissingToken)?;

        let header = decode_header(token).map_err(|e| {
            debug!("Rejected token: {}", e);
            AuthError::InvalidToken
        })?;
        let kid = header.kid.ok_or(AuthError::InvalidToken)?;

        let jwk = self.keys.get(&kid).await?.ok_or(AuthError::InvalidToken)?;
        let decoding_key =
            DecodingKey::from_rsa_components(&jwk.n, &jwk.e).map_err(|_| AuthError::InvalidToken)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);

        let data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            debug!("Rejected token: {}", e);
            AuthError::InvalidToken
        })?;
        let identity = Identity::from(data.claims);

        self.check_rate_limit(&identity.subject).await?;
        Ok(identity)
    }

    async fn check_rate_limit(&self, subject: &str) -> Result<(), AuthError> {
        let mut limiters = self.rate_limiters.lock().await;
        let limiter = limiters.entry(subject.to_string()).or_insert_with(|| {
            Arc::new(RateLimiter::direct(Quota::per_minute(
                NonZeroU32::new(REQUESTS_PER_MINUTE).unwrap(),
            )))
        });

        if limiter.check().is_err() {
            return Err(AuthError::RateLimitExceeded);
        }
        Ok(())
    }
}

fn bearer_token(authorization: Option<&str>) -> Option<&str> {
    let value = authorization?;
    let mut parts = value.splitn(2, ' ');
    match (parts.next(), parts.next()) {
        (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("bearer") => {
            let token = token.trim();
            (!token.is_empty()).then_some(token)
        }
        _ => None,
    }
}
