//! Keyed, time-windowed attempt limiter with escalating backoff.
//!
//! Used for generic submission throttling and for per-fingerprinted-
//! attribute abuse prevention. The limiter is a security control: if the
//! backing counter store is unreachable it fails loudly rather than
//! silently permitting unlimited attempts.

pub mod error;
pub mod escalating;
pub mod limiter;
pub mod store;

pub use error::LimiterError;
pub use escalating::EscalatingLimiter;
pub use limiter::{AttemptType, RateLimit, RateLimitConfig, RateLimiter, Scope};
pub use store::{AttemptState, CounterStore, InMemoryCounterStore};
