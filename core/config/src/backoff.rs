// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Backoff delay schedules.
//!
//! These configs produce the delay iterators used for connection retry;
//! per-call retry decisions layer error classification and deadline
//! arithmetic on top (see `retry`).

use duration_string::DurationString;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_retry::strategy::{ExponentialBackoff, FixedInterval, jitter};

pub trait Strategy {
    fn delays(&self) -> Box<dyn Iterator<Item = Duration> + Send>;
}

pub(crate) fn default_max_attempts() -> usize {
    usize::MAX
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(default)]
pub struct ExponentialConfig {
    /// Base delay in milliseconds
    base: u64,
    factor: u64,
    #[schemars(with = "String")]
    max_delay: DurationString,
    #[serde(default = "default_max_attempts")]
    max_attempts: usize,
    #[serde(default)]
    jitter: bool,
}

impl ExponentialConfig {
    pub fn new(
        base: u64,
        factor: u64,
        max_delay: Duration,
        max_attempts: usize,
        jitter: bool,
    ) -> Self {
        ExponentialConfig {
            base,
            factor,
            max_delay: max_delay.into(),
            max_attempts,
            jitter,
        }
    }
}

impl Default for ExponentialConfig {
    fn default() -> Self {
        ExponentialConfig {
            base: 100,
            factor: 1,
            max_delay: Duration::from_millis(1000).into(),
            max_attempts: default_max_attempts(),
            jitter: true,
        }
    }
}

impl Strategy for ExponentialConfig {
    fn delays(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        let schedule = ExponentialBackoff::from_millis(self.base)
            .factor(self.factor)
            .max_delay(self.max_delay.into())
            .take(self.max_attempts);
        let jitter_flag = self.jitter;

        Box::new(schedule.map(move |d| if jitter_flag { jitter(d) } else { d }))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(default)]
pub struct FixedIntervalConfig {
    #[schemars(with = "String")]
    interval: DurationString,
    #[serde(default = "default_max_attempts")]
    max_attempts: usize,
}

impl FixedIntervalConfig {
    pub fn new(interval: Duration, max_attempts: usize) -> Self {
        FixedIntervalConfig {
            interval: interval.into(),
            max_attempts,
        }
    }
}

impl Default for FixedIntervalConfig {
    fn default() -> Self {
        FixedIntervalConfig {
            interval: Duration::from_millis(1000).into(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Strategy for FixedIntervalConfig {
    fn delays(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        Box::new(FixedInterval::new(self.interval.into()).take(self.max_attempts))
    }
}

/// Enum holding one backoff configuration.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum BackoffConfig {
    /// Exponential backoff retry config.
    Exponential(ExponentialConfig),
    /// FixedInterval backoff retry config.
    FixedInterval(FixedIntervalConfig),
}

impl BackoffConfig {
    pub fn new_exponential(
        base: u64,
        factor: u64,
        max_delay: Duration,
        max_attempts: usize,
        jitter: bool,
    ) -> Self {
        BackoffConfig::Exponential(ExponentialConfig::new(
            base,
            factor,
            max_delay,
            max_attempts,
            jitter,
        ))
    }

    pub fn new_fixed_interval(interval: Duration, max_attempts: usize) -> Self {
        BackoffConfig::FixedInterval(FixedIntervalConfig::new(interval, max_attempts))
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig::Exponential(ExponentialConfig::default())
    }
}

impl Strategy for BackoffConfig {
    fn delays(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        match self {
            BackoffConfig::Exponential(b) => b.delays(),
            BackoffConfig::FixedInterval(b) => b.delays(),
        }
    }
}
