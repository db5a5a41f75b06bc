//! Validation errors for the core types.

use thiserror::Error;

/// Errors produced while constructing or validating core types.
#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid jurisdiction code: {0:?}")]
    InvalidJurisdiction(String),

    #[error("invalid SSN: {0}")]
    InvalidSsn(String),

    #[error("{0}")]
    Other(String),
}
