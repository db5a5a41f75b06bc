//! Transport-level errors raised inside adapters before they are
//! normalized into result exceptions.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProofingError {
    #[error("vendor endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("vendor request timed out: {0}")]
    Timeout(String),

    #[error("vendor returned HTTP status {0}")]
    HttpStatus(u16),

    #[error("invalid vendor response: {0}")]
    InvalidResponse(String),

    #[error("vendor authentication failed: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

impl ProofingError {
    /// Whether retrying the call could plausibly succeed. Definitive
    /// vendor answers (HTTP errors, malformed bodies, auth rejections)
    /// are never retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProofingError::Unreachable(_) | ProofingError::Timeout(_))
    }

    /// Classify a `reqwest` failure.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProofingError::Timeout(err.to_string())
        } else if err.is_connect() {
            ProofingError::Unreachable(err.to_string())
        } else {
            ProofingError::Other(err.to_string())
        }
    }
}
