//! Abstract counter storage for the rate limiter.
//!
//! Every backend (Redis in production, in-memory for tests and
//! single-node deployments) implements [`CounterStore`]. The limiter
//! depends only on the trait.

use crate::error::LimiterError;
use attest_types::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// State of one counter key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptState {
    /// Attempts within the current window.
    pub count: u32,
    /// When the first attempt of the current window was made.
    pub window_started_at: Timestamp,
    /// When the current window lapses and the count resets.
    pub expires_at: Timestamp,
}

/// Windowed counter storage. Increments must be atomic: two concurrent
/// submissions of the same fingerprinted SSN may not both observe the
/// pre-increment count.
pub trait CounterStore: Send + Sync {
    /// Increment the counter under `key`, starting a fresh window of
    /// `window_secs` if none is active, and return the resulting state.
    fn increment(
        &self,
        key: &str,
        window_secs: u64,
        now: Timestamp,
    ) -> Result<AttemptState, LimiterError>;

    /// Decrement the counter under `key` by one, saturating at zero.
    /// Used to forgive an attempt excused after the fact.
    fn decrement(&self, key: &str, now: Timestamp) -> Result<(), LimiterError>;

    /// Current state for `key`, if a window is active at `now`.
    fn get(&self, key: &str, now: Timestamp) -> Result<Option<AttemptState>, LimiterError>;

    /// Drop the counter under `key` entirely.
    fn reset(&self, key: &str) -> Result<(), LimiterError>;
}

/// A process-local counter store. A single mutex over the map makes each
/// increment atomic with respect to concurrent callers.
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<String, AttemptState>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterStore for InMemoryCounterStore {
    fn increment(
        &self,
        key: &str,
        window_secs: u64,
        now: Timestamp,
    ) -> Result<AttemptState, LimiterError> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|e| LimiterError::StoreUnavailable(e.to_string()))?;

        let state = counters
            .entry(key.to_string())
            .and_modify(|state| {
                if state.expires_at <= now {
                    // Window lapsed: the next attempt starts a fresh count.
                    *state = AttemptState {
                        count: 1,
                        window_started_at: now,
                        expires_at: now.plus_secs(window_secs),
                    };
                } else {
                    state.count += 1;
                }
            })
            .or_insert_with(|| AttemptState {
                count: 1,
                window_started_at: now,
                expires_at: now.plus_secs(window_secs),
            });

        Ok(*state)
    }

    fn decrement(&self, key: &str, now: Timestamp) -> Result<(), LimiterError> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|e| LimiterError::StoreUnavailable(e.to_string()))?;
        if let Some(state) = counters.get_mut(key) {
            if state.expires_at > now {
                state.count = state.count.saturating_sub(1);
            }
        }
        Ok(())
    }

    fn get(&self, key: &str, now: Timestamp) -> Result<Option<AttemptState>, LimiterError> {
        let counters = self
            .counters
            .lock()
            .map_err(|e| LimiterError::StoreUnavailable(e.to_string()))?;
        Ok(counters
            .get(key)
            .copied()
            .filter(|state| state.expires_at > now))
    }

    fn reset(&self, key: &str) -> Result<(), LimiterError> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|e| LimiterError::StoreUnavailable(e.to_string()))?;
        counters.remove(key);
        Ok(())
    }
}
