//! Shared vendor authentication token cache.
//!
//! The state-record service hands out short-lived session tokens. All
//! concurrent proofing attempts share one cached token; the lock is held
//! across the fetch so at most one refresh is ever in flight, and the
//! token is refreshed ahead of its expiry.

use crate::error::ProofingError;
use attest_types::Timestamp;
use serde::Deserialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Refresh this many seconds before the vendor-reported expiry, so a
/// token is never used in its final moments.
const REFRESH_MARGIN_SECS: u64 = 60;

#[derive(Clone, Debug)]
struct CachedToken {
    token: String,
    expires_at: Timestamp,
}

/// Where fresh tokens come from.
pub enum TokenSource {
    Http(HttpTokenSource),
    Fixed(FixedTokenSource),
}

impl TokenSource {
    async fn fetch(&self) -> Result<(String, u64), ProofingError> {
        match self {
            TokenSource::Http(source) => source.fetch().await,
            TokenSource::Fixed(source) => source.fetch(),
        }
    }
}

/// Fetches tokens from the vendor's authentication endpoint.
pub struct HttpTokenSource {
    http: reqwest::Client,
    auth_url: String,
    client_key: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct RawTokenResponse {
    token: String,
    expires_in_secs: u64,
}

impl HttpTokenSource {
    pub fn new(
        auth_url: impl Into<String>,
        client_key: impl Into<String>,
        client_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProofingError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProofingError::Other(e.to_string()))?;
        Ok(Self {
            http,
            auth_url: auth_url.into(),
            client_key: client_key.into(),
            client_secret: client_secret.into(),
        })
    }

    async fn fetch(&self) -> Result<(String, u64), ProofingError> {
        let response = self
            .http
            .post(&self.auth_url)
            .json(&serde_json::json!({
                "client_key": self.client_key,
                "client_secret": self.client_secret,
            }))
            .send()
            .await
            .map_err(ProofingError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(ProofingError::Auth(format!(
                "token endpoint returned HTTP {}",
                response.status()
            )));
        }

        let raw: RawTokenResponse = response
            .json()
            .await
            .map_err(|e| ProofingError::InvalidResponse(e.to_string()))?;
        Ok((raw.token, raw.expires_in_secs))
    }
}

/// Deterministic token source for tests; counts fetches.
pub struct FixedTokenSource {
    token: String,
    ttl_secs: u64,
    fetches: AtomicU32,
}

impl FixedTokenSource {
    pub fn new(token: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            token: token.into(),
            ttl_secs,
            fetches: AtomicU32::new(0),
        }
    }

    fn fetch(&self) -> Result<(String, u64), ProofingError> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok((format!("{}-{}", self.token, n + 1), self.ttl_secs))
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

/// The shared cache. Cheap to share behind an `Arc`.
pub struct TokenCache {
    source: TokenSource,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(source: TokenSource) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
        }
    }

    /// The current token, fetching or refreshing if needed. Concurrent
    /// callers serialize on the cache lock, so only one fetch runs even
    /// when many attempts arrive with a cold or expiring cache.
    pub async fn fetch_token(&self, now: Timestamp) -> Result<String, ProofingError> {
        let mut cached = self.cached.lock().await;

        if let Some(entry) = cached.as_ref() {
            if now.plus_secs(REFRESH_MARGIN_SECS) < entry.expires_at {
                return Ok(entry.token.clone());
            }
        }

        let (token, ttl_secs) = self.source.fetch().await?;
        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at: now.plus_secs(ttl_secs),
        });
        Ok(token)
    }

    /// Drop the cached token so the next caller fetches fresh. Used
    /// when the vendor rejects a token before its reported expiry.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}
