// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Attempt executor.
//!
//! Runs one call's attempts under the context's retry policy: the policy
//! decides retry-or-give-up deterministically, this loop samples the
//! jitter, sleeps, observes cancellation and the overall deadline, and
//! re-dispatches. Retries are an internal detail; the caller sees the
//! last attempt's status.

use std::future::Future;
use std::time::Duration;

use cortex_config::retry::RetryDecision;
use cortex_types::{Result, Status};

use crate::context::CallContext;

/// Parameters of one dispatch attempt.
#[derive(Debug, Clone, Copy)]
pub struct Attempt {
    /// 1-based attempt index.
    pub index: u32,
    /// Deadline for this attempt: min(per-attempt timeout, remaining
    /// overall budget).
    pub timeout: Option<Duration>,
}

/// Run `attempt_fn` until it succeeds, the policy gives up, the overall
/// deadline passes or the call is cancelled.
pub async fn retry<T, F, Fut>(ctx: &CallContext, mut attempt_fn: F) -> Result<T>
where
    F: FnMut(Attempt) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt_index = 1u32;

    loop {
        ctx.check_cancelled()?;
        ctx.check_deadline()?;

        let (timeout, attempt_deadline_was_shorter) = ctx.attempt_timeout();
        let attempt = Attempt {
            index: attempt_index,
            timeout,
        };

        // The attempt races the cancellation signal so a caller-side
        // cancel is observed even while the request is in flight.
        let result = tokio::select! {
            _ = ctx.cancellation().cancelled() => {
                return Err(Status::cancelled("call cancelled"));
            }
            result = attempt_fn(attempt) => result,
        };
        let status = match result {
            Ok(value) => return Ok(value),
            Err(status) => status,
        };

        let Some(policy) = ctx.retry() else {
            return Err(status);
        };

        let decision = policy.check(
            status.code(),
            attempt_index,
            ctx.elapsed(),
            attempt_deadline_was_shorter,
        );
        let base_delay = match decision {
            RetryDecision::GiveUp => {
                tracing::debug!(
                    attempt = attempt_index,
                    code = %status.code(),
                    "giving up after failed attempt"
                );
                return Err(status);
            }
            RetryDecision::RetryAfter(delay) => delay,
        };

        // Uniform jitter in [0, delay] on top of the base delay.
        let jitter = base_delay.mul_f64(rand::random::<f64>());
        let delay = base_delay + jitter;

        // Re-check the budget with the jitter included so the loop never
        // wakes up past the deadline with nothing useful left to do.
        if let Some(remaining) = ctx.remaining() {
            if delay + policy.min_attempt_time() > remaining {
                tracing::debug!(
                    attempt = attempt_index,
                    code = %status.code(),
                    "remaining budget too small for another attempt"
                );
                return Err(status);
            }
        }

        tracing::warn!(
            attempt = attempt_index,
            code = %status.code(),
            delay_ms = delay.as_millis() as u64,
            "attempt failed, retrying"
        );

        tokio::select! {
            _ = ctx.cancellation().cancelled() => {
                return Err(Status::cancelled("call cancelled while waiting to retry"));
            }
            _ = tokio::time::sleep(delay) => {}
        }

        attempt_index += 1;
    }
}
