use attest_costs::CostError;
use attest_limiter::LimiterError;
use attest_proofing::ProofingError;
use attest_types::Timestamp;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The account or SSN fingerprint has exhausted its attempts.
    #[error("proofing attempt rate limited")]
    RateLimited { retry_at: Option<Timestamp> },

    /// A capture session with this id already exists. Re-running an
    /// orchestration pass for a live session is not supported.
    #[error("capture session {0} already exists")]
    SessionExists(String),

    #[error("capture session store unavailable: {0}")]
    SessionStore(String),

    #[error(transparent)]
    Limiter(#[from] LimiterError),

    #[error(transparent)]
    Cost(#[from] CostError),

    #[error("vendor client construction failed: {0}")]
    Vendor(#[from] ProofingError),

    #[error("configuration error: {0}")]
    Config(String),
}
