use thiserror::Error;

#[derive(Debug, Error)]
pub enum CostError {
    #[error("cost ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("{0}")]
    Other(String),
}
