//! Escalating variant for login-style abuse.
//!
//! Each time a scope exhausts a window at the cap, a lockout starts and
//! the violation level rises: the next window is twice as long and
//! allows twice as many attempts before the (also doubled) lockout, so
//! every successive violation costs more time than the last. A
//! successful attempt clears the level.

use crate::error::LimiterError;
use crate::limiter::{AttemptType, RateLimit, Scope};
use crate::store::CounterStore;
use attest_types::Timestamp;
use std::sync::Arc;

/// Highest violation level the multiplier will grow to; beyond this the
/// window stops doubling (it is already days long).
const MAX_LEVEL: u32 = 8;

pub struct EscalatingLimiter {
    store: Arc<dyn CounterStore>,
    base: RateLimit,
    attempt_type: AttemptType,
}

impl EscalatingLimiter {
    pub fn new(store: Arc<dyn CounterStore>, base: RateLimit, attempt_type: AttemptType) -> Self {
        Self {
            store,
            base,
            attempt_type,
        }
    }

    fn attempts_key(&self, scope: &Scope) -> String {
        format!("escalate:{scope}:{}", self.attempt_type.as_str())
    }

    fn lockout_key(&self, scope: &Scope) -> String {
        format!("escalate-lockout:{scope}:{}", self.attempt_type.as_str())
    }

    fn level_key(&self, scope: &Scope) -> String {
        format!("escalate-level:{scope}:{}", self.attempt_type.as_str())
    }

    /// Current violation level (0 = no prior violation).
    pub fn level(&self, scope: &Scope, now: Timestamp) -> Result<u32, LimiterError> {
        Ok(self
            .store
            .get(&self.level_key(scope), now)?
            .map(|s| s.count.min(MAX_LEVEL))
            .unwrap_or(0))
    }

    /// The limit in force at the given violation level: both window and
    /// allowance multiplied by `2^level`.
    pub fn limit_at(&self, level: u32) -> RateLimit {
        let factor = 1u64 << level.min(MAX_LEVEL);
        RateLimit {
            max_attempts: self.base.max_attempts.saturating_mul(factor as u32),
            window_secs: self.base.window_secs.saturating_mul(factor),
        }
    }

    /// Count one failed attempt. Exhausting the current window at its
    /// cap starts a lockout sized for the *next* level and raises the
    /// level; the raised level is held for twice the lockout, so a
    /// prompt repeat offence escalates again.
    pub fn record_failure(&self, scope: &Scope, now: Timestamp) -> Result<u32, LimiterError> {
        let level = self.level(scope, now)?;
        let limit = self.limit_at(level);

        let state = self
            .store
            .increment(&self.attempts_key(scope), limit.window_secs, now)?;

        if state.count >= limit.max_attempts {
            let next = self.limit_at((level + 1).min(MAX_LEVEL));
            self.store
                .increment(&self.lockout_key(scope), next.window_secs, now)?;
            self.store
                .increment(&self.level_key(scope), next.window_secs.saturating_mul(2), now)?;
            tracing::warn!(
                scope = %scope,
                level = level + 1,
                lockout_secs = next.window_secs,
                "escalating limiter locked scope out"
            );
        }
        Ok(state.count)
    }

    /// Whether the scope is currently locked out.
    pub fn is_throttled(&self, scope: &Scope, now: Timestamp) -> Result<bool, LimiterError> {
        Ok(self.store.get(&self.lockout_key(scope), now)?.is_some())
    }

    /// A successful attempt clears the window, the lockout, and the level.
    pub fn record_success(&self, scope: &Scope) -> Result<(), LimiterError> {
        self.store.reset(&self.attempts_key(scope))?;
        self.store.reset(&self.lockout_key(scope))?;
        self.store.reset(&self.level_key(scope))
    }
}
