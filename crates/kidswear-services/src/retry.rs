//! Retry with exponential back-off and jitter for transient store conflicts.
//!
//! Only [`StoreError::is_transient`] errors are retried: serialization
//! failures, deadlocks, order-number collisions and stale order reads. The
//! operation closure is re-run from scratch each time, so it must re-read
//! whatever state it depends on.

use std::future::Future;
use std::time::Duration;

use crate::store::StoreError;

/// Base delay for the first retry.
pub(crate) const BACKOFF_BASE_MS: u64 = 25;

/// Runs `operation` with up to `max_retries` additional attempts on transient
/// errors.
///
/// The delay doubles per attempt from `backoff_base_ms`, gets ±25 % jitter,
/// and is capped at 2 s. Other errors are returned immediately.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    const MAX_DELAY_MS: u64 = 2_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_transient() || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient store conflict, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
