//! Bounded retry for transient vendor failures.

use crate::error::ProofingError;
use std::future::Future;
use std::time::Duration;

/// Maximum attempts for one vendor call (1 initial + 2 retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay before the first retry; doubles per retry.
const BASE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Run `op` up to `max_attempts` times, retrying only transient
/// failures (connection refused, timeouts). Definitive vendor answers —
/// HTTP error statuses, malformed bodies, auth rejections — are returned
/// immediately, never retried.
pub async fn with_retries<T, F, Fut>(max_attempts: u32, mut op: F) -> Result<T, ProofingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProofingError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = BASE_RETRY_DELAY * 2u32.saturating_pow(attempt - 1);
                tracing::debug!(attempt, error = %err, "retrying transient vendor failure");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
