//! Limit configuration and per-call overrides.

use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(900);

/// Process-wide defaults, typically the `[rate_limit]` table of the config file.
///
/// Values are kept raw so that a zero or negative setting can fall back to the
/// built-in default instead of failing to load.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i64,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: i64,
}

fn default_max_attempts() -> i64 {
    DEFAULT_MAX_ATTEMPTS as i64
}

fn default_interval_secs() -> i64 {
    DEFAULT_INTERVAL.as_secs() as i64
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl RateLimitConfig {
    pub(crate) fn limits(&self) -> Limits {
        Limits {
            max_attempts: positive_u32(self.max_attempts).unwrap_or(DEFAULT_MAX_ATTEMPTS),
            interval: positive_secs(self.interval_secs).unwrap_or(DEFAULT_INTERVAL),
        }
    }
}

/// Per-call overrides. Unset or non-positive fields use the limiter's defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimitOptions {
    pub max_attempts: Option<i64>,
    pub interval_secs: Option<i64>,
}

impl RateLimitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_attempts(mut self, max_attempts: i64) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn interval_secs(mut self, secs: i64) -> Self {
        self.interval_secs = Some(secs);
        self
    }

    pub(crate) fn resolve(&self, defaults: Limits) -> Limits {
        Limits {
            max_attempts: self
                .max_attempts
                .and_then(positive_u32)
                .unwrap_or(defaults.max_attempts),
            interval: self
                .interval_secs
                .and_then(positive_secs)
                .unwrap_or(defaults.interval),
        }
    }
}

/// Validated limits in effect for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Limits {
    pub max_attempts: u32,
    pub interval: Duration,
}

fn positive_u32(value: i64) -> Option<u32> {
    u32::try_from(value).ok().filter(|v| *v > 0)
}

fn positive_secs(value: i64) -> Option<Duration> {
    u64::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .map(Duration::from_secs)
}
