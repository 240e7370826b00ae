//! Call controls for external collaborators: per-attempt timeout, retry with
//! exponential backoff, a hard ceiling over the whole call, cancellation.
//! A collaborator that panics is treated as having rejected the request.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::config::CallPolicy;
use crate::metrics::METRICS;
use crate::obs;
use crate::ports::ExternalCallError;

/// Why a controlled call produced no value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CallFailure {
    #[error("{label} timed out after {attempts} attempt(s), last attempt limit {limit_ms}ms")]
    Timeout {
        label: &'static str,
        attempts: u32,
        limit_ms: u64,
    },

    #[error("{label} failed after {attempts} attempt(s): {reason}")]
    Exhausted {
        label: &'static str,
        attempts: u32,
        reason: String,
    },

    #[error("{label} rejected the request: {reason}")]
    Rejected { label: &'static str, reason: String },

    #[error("{label} exceeded its {ceiling_ms}ms ceiling after {attempts} attempt(s)")]
    CeilingExceeded {
        label: &'static str,
        attempts: u32,
        ceiling_ms: u64,
    },

    #[error("{label} cancelled")]
    Cancelled { label: &'static str },
}

impl CallFailure {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CallFailure::Cancelled { .. })
    }
}

/// A successful controlled call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome<T> {
    pub value: T,
    /// Number of attempts made (1 = no retries used).
    pub attempts: u32,
}

/// Run `call_fn` under `policy`.
///
/// Transient errors and per-attempt timeouts are retried up to
/// `policy.max_retries` times, sleeping `backoff_base_ms * 2^(attempt-1)`
/// between attempts. Permanent errors return immediately. The whole sequence
/// is bounded by `policy.ceiling_ms` and aborts as soon as `cancel` fires.
/// A panic inside `call_fn` is caught and reported as
/// [`CallFailure::Rejected`], so the caller keeps its own state.
pub async fn call_with_controls<T, F, Fut>(
    policy: &CallPolicy,
    label: &'static str,
    cancel: &CancellationToken,
    call_fn: F,
) -> Result<CallOutcome<T>, CallFailure>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ExternalCallError>>,
{
    let max_attempts = policy.max_retries + 1;
    let attempts = AtomicU32::new(0);
    let started = Instant::now();

    let attempt_loop = async {
        loop {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            let guarded = AssertUnwindSafe(async { call_fn().await }).catch_unwind();
            let failure = match tokio::time::timeout(policy.timeout(), guarded).await {
                Ok(Ok(Ok(value))) => return Ok(value),
                Ok(Err(payload)) => {
                    METRICS.inc_call_panics();
                    let reason = format!("panicked: {}", panic_message(payload.as_ref()));
                    tracing::error!(call = label, attempt, %reason, "external call panicked");
                    return Err(CallFailure::Rejected { label, reason });
                }
                Ok(Ok(Err(ExternalCallError::Permanent(reason)))) => {
                    return Err(CallFailure::Rejected { label, reason });
                }
                Ok(Ok(Err(ExternalCallError::Transient(reason)))) => {
                    if attempt >= max_attempts {
                        return Err(CallFailure::Exhausted {
                            label,
                            attempts: attempt,
                            reason,
                        });
                    }
                    reason
                }
                Err(_elapsed) => {
                    if attempt >= max_attempts {
                        return Err(CallFailure::Timeout {
                            label,
                            attempts: attempt,
                            limit_ms: policy.timeout_ms,
                        });
                    }
                    format!("attempt timed out after {}ms", policy.timeout_ms)
                }
            };

            METRICS.inc_call_retries();
            obs::emit_call_retry(label, attempt, &failure);
            tokio::time::sleep(policy.backoff(attempt)).await;
        }
    };

    let raced = tokio::select! {
        _ = cancel.cancelled() => None,
        bounded = tokio::time::timeout(policy.ceiling(), attempt_loop) => Some(bounded),
    };

    let attempts = attempts.load(Ordering::Relaxed);
    let result = match raced {
        None => Err(CallFailure::Cancelled { label }),
        Some(Err(_elapsed)) => Err(CallFailure::CeilingExceeded {
            label,
            attempts,
            ceiling_ms: policy.ceiling_ms,
        }),
        Some(Ok(inner)) => inner.map(|value| CallOutcome { value, attempts }),
    };

    if let Err(ref failure) = result {
        if !failure.is_cancelled() {
            METRICS.inc_call_failures();
            tracing::debug!(
                call = label,
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = %failure,
                "external call gave up"
            );
        }
    }
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
