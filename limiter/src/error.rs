use thiserror::Error;

#[derive(Debug, Error)]
pub enum LimiterError {
    /// The backing counter store could not be read or written. Callers
    /// must treat this as a hard failure, never as "not throttled".
    #[error("counter store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{0}")]
    Other(String),
}
