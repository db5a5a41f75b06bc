//! The windowed rate limiter.
//!
//! A counter key combines a scope (an account id or an attribute
//! fingerprint) with an attempt type. The first attempt opens a window;
//! attempts inside the window accumulate; a lapsed window starts over.
//! Crossing the configured maximum puts the key in the throttled state
//! until the window lapses.

use crate::error::LimiterError;
use crate::store::CounterStore;
use attest_types::{AccountId, SsnFingerprint, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// What kind of attempt is being counted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptType {
    /// A whole proofing submission by one account.
    IdentitySubmission,
    /// Resolution attempts against one SSN fingerprint, across accounts.
    SsnProofing,
    /// Address-resolution attempts by one account.
    AddressProofing,
    /// Phone-ownership attempts by one account.
    PhoneProofing,
}

impl AttemptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptType::IdentitySubmission => "identity_submission",
            AttemptType::SsnProofing => "ssn_proofing",
            AttemptType::AddressProofing => "address_proofing",
            AttemptType::PhoneProofing => "phone_proofing",
        }
    }
}

/// What the counted attempts belong to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    Account(AccountId),
    SsnFingerprint(SsnFingerprint),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Account(id) => write!(f, "acct:{id}"),
            Scope::SsnFingerprint(fp) => write!(f, "ssn:{fp}"),
        }
    }
}

/// One limit: at most `max_attempts` per `window_secs`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub max_attempts: u32,
    pub window_secs: u64,
}

/// Per-attempt-type limits, externally configured.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    limits: HashMap<AttemptType, RateLimit>,
}

impl RateLimitConfig {
    pub fn new(limits: HashMap<AttemptType, RateLimit>) -> Self {
        Self { limits }
    }

    /// Defaults mirroring typical production settings.
    pub fn defaults() -> Self {
        let mut limits = HashMap::new();
        limits.insert(
            AttemptType::IdentitySubmission,
            RateLimit {
                max_attempts: 5,
                window_secs: 6 * 3600,
            },
        );
        limits.insert(
            AttemptType::SsnProofing,
            RateLimit {
                max_attempts: 10,
                window_secs: 24 * 3600,
            },
        );
        limits.insert(
            AttemptType::AddressProofing,
            RateLimit {
                max_attempts: 5,
                window_secs: 6 * 3600,
            },
        );
        limits.insert(
            AttemptType::PhoneProofing,
            RateLimit {
                max_attempts: 5,
                window_secs: 6 * 3600,
            },
        );
        Self { limits }
    }

    pub fn limit_for(&self, attempt_type: AttemptType) -> RateLimit {
        self.limits
            .get(&attempt_type)
            .copied()
            .unwrap_or(RateLimit {
                max_attempts: 5,
                window_secs: 3600,
            })
    }

    pub fn set(&mut self, attempt_type: AttemptType, limit: RateLimit) {
        self.limits.insert(attempt_type, limit);
    }
}

/// Keyed, windowed attempt limiter.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    fn key(scope: &Scope, attempt_type: AttemptType) -> String {
        format!("ratelimit:{scope}:{}", attempt_type.as_str())
    }

    /// Count one attempt and return the resulting total for the window.
    pub fn increment(
        &self,
        scope: &Scope,
        attempt_type: AttemptType,
        now: Timestamp,
    ) -> Result<u32, LimiterError> {
        let limit = self.config.limit_for(attempt_type);
        let state = self
            .store
            .increment(&Self::key(scope, attempt_type), limit.window_secs, now)?;
        if state.count > limit.max_attempts {
            tracing::warn!(
                scope = %scope,
                attempt_type = attempt_type.as_str(),
                count = state.count,
                max = limit.max_attempts,
                "rate limit exceeded"
            );
        }
        Ok(state.count)
    }

    /// Whether the scope has crossed the maximum within the live window.
    pub fn is_throttled(
        &self,
        scope: &Scope,
        attempt_type: AttemptType,
        now: Timestamp,
    ) -> Result<bool, LimiterError> {
        let limit = self.config.limit_for(attempt_type);
        let state = self.store.get(&Self::key(scope, attempt_type), now)?;
        Ok(state.is_some_and(|s| s.count > limit.max_attempts))
    }

    /// Attempts left before the scope becomes throttled (0 when throttled).
    pub fn remaining(
        &self,
        scope: &Scope,
        attempt_type: AttemptType,
        now: Timestamp,
    ) -> Result<u32, LimiterError> {
        let limit = self.config.limit_for(attempt_type);
        let count = self
            .store
            .get(&Self::key(scope, attempt_type), now)?
            .map(|s| s.count)
            .unwrap_or(0);
        Ok(limit.max_attempts.saturating_sub(count))
    }

    /// When the live window lapses; `None` when no window is active.
    pub fn expires_at(
        &self,
        scope: &Scope,
        attempt_type: AttemptType,
        now: Timestamp,
    ) -> Result<Option<Timestamp>, LimiterError> {
        Ok(self
            .store
            .get(&Self::key(scope, attempt_type), now)?
            .map(|s| s.expires_at))
    }

    /// Forgive one previously counted attempt (e.g. a failure excused by
    /// a vendor maintenance window).
    pub fn forgive(
        &self,
        scope: &Scope,
        attempt_type: AttemptType,
        now: Timestamp,
    ) -> Result<(), LimiterError> {
        self.store.decrement(&Self::key(scope, attempt_type), now)
    }

    /// Drop all counted attempts for the scope.
    pub fn reset(&self, scope: &Scope, attempt_type: AttemptType) -> Result<(), LimiterError> {
        self.store.reset(&Self::key(scope, attempt_type))
    }
}
