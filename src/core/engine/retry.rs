//! Retry loop with exponential backoff around a single-attempt unit of work.

use crate::core::engine::result::ExecutionResult;
use crate::core::engine::schema::RetryPolicy;
use crate::core::error::AppError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Deterministic delay before the attempt following `attempt` (1-based):
/// `delay_ms * multiplier^(attempt - 1)`.
pub fn base_delay_ms(policy: &RetryPolicy, attempt: u32) -> u64 {
    let multiplier = policy
        .backoff_multiplier
        .filter(|m| m.is_finite() && *m > 0.0)
        .unwrap_or(DEFAULT_BACKOFF_MULTIPLIER);
    let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
    let delay = policy.delay_ms as f64 * multiplier.powi(exponent);
    if delay.is_finite() {
        delay.min(u64::MAX as f64) as u64
    } else {
        u64::MAX
    }
}

/// Backoff delay including optional uniform jitter in `0..=jitter_ms`.
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let jitter = match policy.jitter_ms {
        Some(bound) if bound > 0 => rand::thread_rng().gen_range(0..=bound),
        _ => 0,
    };
    Duration::from_millis(base_delay_ms(policy, attempt).saturating_add(jitter))
}

/// Run `attempt_fn` until it succeeds, fails non-retryably, or the policy's
/// attempts are used up. The returned result carries the attempt number that
/// produced it.
pub async fn execute_with_retry<F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut attempt_fn: F,
) -> ExecutionResult
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ExecutionResult>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        if cancel.is_cancelled() {
            return cancelled_result(attempt);
        }

        let mut result = attempt_fn(attempt).await;
        result.meta.attempt = attempt;

        if result.is_success() || attempt >= max_attempts || !result.is_retryable_failure() {
            return result;
        }

        let delay = backoff_delay(policy, attempt);
        tracing::warn!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            status = ?result.meta.status_code,
            error = %result.error().map(|e| e.message.as_str()).unwrap_or_default(),
            "retrying after failed attempt"
        );

        tokio::select! {
            _ = cancel.cancelled() => return cancelled_result(attempt),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}

fn cancelled_result(attempt: u32) -> ExecutionResult {
    let mut result = ExecutionResult::failure(AppError::cancelled());
    result.meta.attempt = attempt;
    result
}
