// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Per-call retry policy and long-running-operation polling policy.
//!
//! `RetryPolicy::check` is a pure decision function: given the failed
//! attempt's error kind, the attempt index and the elapsed time it
//! returns either the next base delay or give-up. The runtime executor
//! samples jitter, sleeps and re-dispatches; keeping the decision here
//! makes it deterministic and unit-testable.

use duration_string::DurationString;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use cortex_types::Code;

/// Outcome of a retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the base delay (jitter added by the executor), then retry.
    RetryAfter(Duration),
    GiveUp,
}

fn default_initial_delay() -> DurationString {
    Duration::from_millis(100).into()
}

fn default_multiplier() -> f64 {
    1.3
}

fn default_max_delay() -> DurationString {
    Duration::from_secs(60).into()
}

fn default_overall_timeout() -> DurationString {
    Duration::from_secs(600).into()
}

fn default_min_attempt_time() -> DurationString {
    Duration::from_millis(10).into()
}

fn default_retryable_codes() -> Vec<Code> {
    vec![Code::Unavailable, Code::ResourceExhausted, Code::DeadlineExceeded]
}

/// Retry policy for one method, mergeable from client defaults.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(default)]
pub struct RetryPolicy {
    /// Error kinds eligible for retry. `DEADLINE_EXCEEDED` is only
    /// honored when the failed attempt ran under a per-attempt deadline
    /// shorter than the overall deadline.
    #[schemars(with = "Vec<String>")]
    pub retryable_codes: Vec<Code>,

    /// First backoff delay.
    #[schemars(with = "String")]
    pub initial_delay: DurationString,

    /// Backoff growth factor per attempt.
    pub multiplier: f64,

    /// Cap on a single backoff delay.
    #[schemars(with = "String")]
    pub max_delay: DurationString,

    /// Overall deadline across all attempts.
    #[schemars(with = "String")]
    pub overall_timeout: DurationString,

    /// Cap on the number of attempts; 0 means unlimited.
    pub max_attempts: u32,

    /// Optional per-attempt timeout; each attempt's deadline is the
    /// minimum of this and the remaining overall deadline.
    #[schemars(with = "Option<String>")]
    pub attempt_timeout: Option<DurationString>,

    /// Shortest attempt worth starting; retrying is pointless when less
    /// than this remains after the backoff sleep.
    #[schemars(with = "String")]
    pub min_attempt_time: DurationString,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            retryable_codes: default_retryable_codes(),
            initial_delay: default_initial_delay(),
            multiplier: default_multiplier(),
            max_delay: default_max_delay(),
            overall_timeout: default_overall_timeout(),
            max_attempts: 0,
            attempt_timeout: None,
            min_attempt_time: default_min_attempt_time(),
        }
    }
}

impl RetryPolicy {
    pub fn with_retryable_codes(self, retryable_codes: Vec<Code>) -> Self {
        Self {
            retryable_codes,
            ..self
        }
    }

    pub fn with_initial_delay(self, initial_delay: Duration) -> Self {
        Self {
            initial_delay: initial_delay.into(),
            ..self
        }
    }

    pub fn with_multiplier(self, multiplier: f64) -> Self {
        Self { multiplier, ..self }
    }

    pub fn with_max_delay(self, max_delay: Duration) -> Self {
        Self {
            max_delay: max_delay.into(),
            ..self
        }
    }

    pub fn with_overall_timeout(self, overall_timeout: Duration) -> Self {
        Self {
            overall_timeout: overall_timeout.into(),
            ..self
        }
    }

    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..self
        }
    }

    pub fn with_attempt_timeout(self, attempt_timeout: Duration) -> Self {
        Self {
            attempt_timeout: Some(attempt_timeout.into()),
            ..self
        }
    }

    pub fn overall_timeout(&self) -> Duration {
        self.overall_timeout.into()
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout.map(Into::into)
    }

    pub fn min_attempt_time(&self) -> Duration {
        self.min_attempt_time.into()
    }

    /// Base delay for the given 1-based attempt index:
    /// `min(initial * multiplier^(attempt-1), max_delay)`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let initial: Duration = self.initial_delay.into();
        let max: Duration = self.max_delay.into();
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let secs = initial.as_secs_f64() * factor.max(0.0);
        if !secs.is_finite() || secs >= max.as_secs_f64() {
            return max;
        }
        Duration::from_secs_f64(secs)
    }

    /// Decide whether the failed attempt should be retried.
    ///
    /// `attempt` is 1-based; `elapsed` is the wall time since the call
    /// started; `attempt_deadline_was_shorter` reports whether the failed
    /// attempt ran under a per-attempt deadline shorter than the overall
    /// one (gates `DEADLINE_EXCEEDED` retries).
    pub fn check(
        &self,
        code: Code,
        attempt: u32,
        elapsed: Duration,
        attempt_deadline_was_shorter: bool,
    ) -> RetryDecision {
        if !self.is_retryable(code, attempt_deadline_was_shorter) {
            return RetryDecision::GiveUp;
        }
        if self.max_attempts != 0 && attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        let overall: Duration = self.overall_timeout.into();
        if elapsed >= overall {
            return RetryDecision::GiveUp;
        }
        let delay = self.base_delay(attempt);
        let min_attempt: Duration = self.min_attempt_time.into();
        if elapsed + delay + min_attempt > overall {
            return RetryDecision::GiveUp;
        }
        RetryDecision::RetryAfter(delay)
    }

    fn is_retryable(&self, code: Code, attempt_deadline_was_shorter: bool) -> bool {
        if !self.retryable_codes.contains(&code) {
            return false;
        }
        if code == Code::DeadlineExceeded {
            return attempt_deadline_was_shorter;
        }
        true
    }
}

fn default_poll_initial_delay() -> DurationString {
    Duration::from_secs(1).into()
}

fn default_poll_multiplier() -> f64 {
    1.5
}

fn default_poll_max_delay() -> DurationString {
    Duration::from_secs(45).into()
}

/// Polling schedule for long-running operations: `d0`, `k`, `d_max`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(default)]
pub struct PollingPolicy {
    #[schemars(with = "String")]
    pub initial_delay: DurationString,
    pub multiplier: f64,
    #[schemars(with = "String")]
    pub max_delay: DurationString,
}

impl Default for PollingPolicy {
    fn default() -> Self {
        PollingPolicy {
            initial_delay: default_poll_initial_delay(),
            multiplier: default_poll_multiplier(),
            max_delay: default_poll_max_delay(),
        }
    }
}

impl PollingPolicy {
    pub fn new(initial_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        PollingPolicy {
            initial_delay: initial_delay.into(),
            multiplier,
            max_delay: max_delay.into(),
        }
    }

    /// Delay before the given 0-based poll: `min(d0 * k^n, d_max)`.
    pub fn delay_for(&self, poll: u32) -> Duration {
        let initial: Duration = self.initial_delay.into();
        let max: Duration = self.max_delay.into();
        let secs = initial.as_secs_f64() * self.multiplier.powi(poll as i32).max(0.0);
        if !secs.is_finite() || secs >= max.as_secs_f64() {
            return max;
        }
        Duration::from_secs_f64(secs)
    }
}
