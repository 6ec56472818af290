// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Per-call options and context.
//!
//! A `CallContext` travels through exactly one call. It is created from
//! the caller's `CallOptions` merged with the client defaults, carries
//! the absolute deadline, the cancellation token, the (mutable until
//! dispatch) metadata, the retry policy and the interceptor chain.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use cortex_config::retry::RetryPolicy;
use cortex_types::{Metadata, Status};

use crate::interceptor::InterceptorChain;

/// Caller-facing options for one call.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Overall timeout for the call, all retries included.
    pub timeout: Option<Duration>,
    /// Extra metadata appended after the client defaults.
    pub metadata: Metadata,
    /// Retry policy override; `None` falls back to the client default.
    pub retry: Option<RetryPolicy>,
    /// External cancellation signal.
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..self
        }
    }

    pub fn with_metadata(self, metadata: Metadata) -> Self {
        Self { metadata, ..self }
    }

    pub fn with_metadata_entry(mut self, key: &str, value: &str) -> Self {
        self.metadata.append(key, value);
        self
    }

    pub fn with_retry(self, retry: RetryPolicy) -> Self {
        Self {
            retry: Some(retry),
            ..self
        }
    }

    pub fn with_cancellation(self, cancel: CancellationToken) -> Self {
        Self {
            cancel: Some(cancel),
            ..self
        }
    }
}

/// State scoped to one call. Never shared across calls.
#[derive(Debug, Clone)]
pub struct CallContext {
    started: Instant,
    deadline: Option<Instant>,
    cancel: CancellationToken,
    metadata: Metadata,
    retry: Option<RetryPolicy>,
    interceptors: Arc<InterceptorChain>,
}

impl CallContext {
    /// Build the context from caller options, pre-merged default
    /// metadata and the client's interceptor chain.
    pub fn new(
        options: CallOptions,
        default_metadata: Metadata,
        default_retry: Option<RetryPolicy>,
        interceptors: Arc<InterceptorChain>,
    ) -> Self {
        let started = Instant::now();
        let mut metadata = default_metadata;
        metadata.merge(options.metadata);

        let retry = options.retry.or(default_retry);

        // The overall deadline is the tighter of the explicit timeout and
        // the retry policy's overall budget.
        let timeout = match (options.timeout, retry.as_ref()) {
            (Some(t), Some(p)) => Some(t.min(p.overall_timeout())),
            (Some(t), None) => Some(t),
            (None, Some(p)) => Some(p.overall_timeout()),
            (None, None) => None,
        };
        let deadline = timeout.map(|t| started + t);

        Self {
            started,
            deadline,
            cancel: options.cancel.unwrap_or_default(),
            metadata,
            retry,
            interceptors,
        }
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the overall deadline; `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Deadline for the next attempt: the minimum of the per-attempt
    /// timeout and the remaining overall budget. The second value
    /// reports whether the attempt deadline is strictly shorter than the
    /// remaining overall one (gates `DEADLINE_EXCEEDED` retries).
    pub fn attempt_timeout(&self) -> (Option<Duration>, bool) {
        let per_attempt = self.retry.as_ref().and_then(|p| p.attempt_timeout());
        let remaining = self.remaining();
        match (per_attempt, remaining) {
            (Some(a), Some(r)) => (Some(a.min(r)), a < r),
            (Some(a), None) => (Some(a), true),
            (None, Some(r)) => (Some(r), false),
            (None, None) => (None, false),
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fails fast when the caller has cancelled the call.
    pub fn check_cancelled(&self) -> Result<(), Status> {
        if self.cancel.is_cancelled() {
            return Err(Status::cancelled("call cancelled"));
        }
        Ok(())
    }

    /// Fails fast when the overall deadline has passed.
    pub fn check_deadline(&self) -> Result<(), Status> {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Status::deadline_exceeded("overall deadline exceeded"));
            }
        }
        Ok(())
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn retry(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }

    pub fn interceptors(&self) -> &Arc<InterceptorChain> {
        &self.interceptors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_types::Code;

    fn context(options: CallOptions) -> CallContext {
        CallContext::new(
            options,
            Metadata::new(),
            None,
            Arc::new(InterceptorChain::new()),
        )
    }

    #[tokio::test]
    async fn test_metadata_merge_order() {
        let mut defaults = Metadata::new();
        defaults.insert("user-agent", "cortex-rust/0.1.0");
        let options = CallOptions::new().with_metadata_entry("x-custom", "v");
        let ctx = CallContext::new(
            options,
            defaults,
            None,
            Arc::new(InterceptorChain::new()),
        );
        let keys: Vec<_> = ctx.metadata().iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["user-agent", "x-custom"]);
    }

    #[tokio::test]
    async fn test_deadline_from_timeout() {
        let ctx = context(CallOptions::new().with_timeout(Duration::from_secs(5)));
        let remaining = ctx.remaining().unwrap();
        assert!(remaining <= Duration::from_secs(5));
        assert!(ctx.check_deadline().is_ok());
    }

    #[tokio::test]
    async fn test_deadline_tightened_by_policy() {
        let policy = RetryPolicy::default().with_overall_timeout(Duration::from_secs(2));
        let ctx = context(
            CallOptions::new()
                .with_timeout(Duration::from_secs(60))
                .with_retry(policy),
        );
        assert!(ctx.remaining().unwrap() <= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_attempt_timeout_is_min_of_both() {
        let policy = RetryPolicy::default()
            .with_overall_timeout(Duration::from_secs(10))
            .with_attempt_timeout(Duration::from_secs(1));
        let ctx = context(CallOptions::new().with_retry(policy));
        let (timeout, shorter) = ctx.attempt_timeout();
        assert!(timeout.unwrap() <= Duration::from_secs(1));
        assert!(shorter);
    }

    #[tokio::test]
    async fn test_attempt_timeout_without_policy_uses_remaining() {
        let ctx = context(CallOptions::new().with_timeout(Duration::from_secs(3)));
        let (timeout, shorter) = ctx.attempt_timeout();
        assert!(timeout.unwrap() <= Duration::from_secs(3));
        assert!(!shorter);
    }

    #[tokio::test]
    async fn test_cancellation() {
        let token = CancellationToken::new();
        let ctx = context(CallOptions::new().with_cancellation(token.clone()));
        assert!(ctx.check_cancelled().is_ok());
        token.cancel();
        assert_eq!(ctx.check_cancelled().unwrap_err().code(), Code::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let ctx = context(CallOptions::new().with_timeout(Duration::from_millis(100)));
        tokio::time::advance(Duration::from_millis(150)).await;
        assert_eq!(
            ctx.check_deadline().unwrap_err().code(),
            Code::DeadlineExceeded
        );
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }
}
