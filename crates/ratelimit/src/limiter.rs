//! Per-key attempt windows.

use crate::clock::{Clock, SystemClock};
use crate::config::{Limits, RateLimitConfig, RateLimitOptions};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Attempts counted against one key.
#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started: Instant,
    /// The longest interval the window has been counted under; used by `sweep`.
    interval: Duration,
}

impl Window {
    fn open(now: Instant, interval: Duration) -> Self {
        Self {
            count: 1,
            started: now,
            interval,
        }
    }

    /// Keep the window alive for the longest interval any caller counted it under.
    fn widen(&mut self, interval: Duration) {
        self.interval = self.interval.max(interval);
    }

    fn expired(&self, now: Instant, interval: Duration) -> bool {
        now.saturating_duration_since(self.started) > interval
    }
}

/// In-memory attempt counter keyed by arbitrary strings such as `"login:<ip>"`.
///
/// Each operation takes the shard lock for its key, so a check and the
/// increment that follows it cannot interleave with another caller on the
/// same key. State is process-local and lost on restart.
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    defaults: Limits,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            defaults: config.limits(),
            clock,
        }
    }

    /// The default attempt ceiling after fallback.
    pub fn max_attempts(&self) -> u32 {
        self.defaults.max_attempts
    }

    /// The default window length after fallback.
    pub fn interval(&self) -> Duration {
        self.defaults.interval
    }

    /// Count one attempt, opening a fresh window if none is live.
    pub fn record_attempt(&self, key: &str, opts: RateLimitOptions) {
        let limits = opts.resolve(self.defaults);
        let now = self.clock.now();

        match self.windows.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let window = entry.get_mut();
                if window.expired(now, limits.interval) {
                    *window = Window::open(now, limits.interval);
                } else {
                    window.count = window.count.saturating_add(1);
                    window.widen(limits.interval);
                    if window.count == limits.max_attempts {
                        tracing::debug!(key, attempts = window.count, "rate limit reached");
                    }
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(Window::open(now, limits.interval));
            }
        }
    }

    /// True iff `key` has a live window holding at least `max_attempts`.
    pub fn check_rate_limit(&self, key: &str, opts: RateLimitOptions) -> bool {
        let limits = opts.resolve(self.defaults);
        let now = self.clock.now();

        self.windows.get(key).is_some_and(|window| {
            !window.expired(now, limits.interval) && window.count >= limits.max_attempts
        })
    }

    /// Check and record in one step.
    ///
    /// Returns `false` without counting anything when `key` is limited;
    /// otherwise counts the attempt and returns `true`.
    pub fn try_acquire(&self, key: &str, opts: RateLimitOptions) -> bool {
        let limits = opts.resolve(self.defaults);
        let now = self.clock.now();

        match self.windows.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let window = entry.get_mut();
                if window.expired(now, limits.interval) {
                    *window = Window::open(now, limits.interval);
                    true
                } else if window.count >= limits.max_attempts {
                    false
                } else {
                    window.count += 1;
                    window.widen(limits.interval);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(Window::open(now, limits.interval));
                true
            }
        }
    }

    /// Attempts counted in the live window, zero if there is none.
    pub fn attempts(&self, key: &str, opts: RateLimitOptions) -> u32 {
        let limits = opts.resolve(self.defaults);
        let now = self.clock.now();

        self.windows
            .get(key)
            .filter(|window| !window.expired(now, limits.interval))
            .map(|window| window.count)
            .unwrap_or(0)
    }

    /// Forget `key` after a successful login.
    pub fn record_success(&self, key: &str) {
        self.reset_attempts(key);
    }

    /// Forget `key`. Missing keys are ignored.
    pub fn reset_attempts(&self, key: &str) {
        self.windows.remove(key);
    }

    /// Drop every key.
    pub fn clear(&self) {
        self.windows.clear();
    }

    /// Number of keys currently tracked, stale or not.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Evict windows that have outlived the longest interval they were counted under.
    /// Returns the number of keys removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.windows.len();
        self.windows
            .retain(|_, window| !window.expired(now, window.interval));
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            tracing::debug!(removed, "swept stale rate limit windows");
        }
        removed
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;

    fn limiter() -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(RateLimitConfig::default(), clock.clone());
        (limiter, clock)
    }

    #[test]
    fn test_single_attempt_limit() {
        let (limiter, _) = limiter();
        let opts = RateLimitOptions::new().max_attempts(1).interval_secs(600);

        limiter.record_attempt("login:1.2.3.4", opts);
        assert!(limiter.check_rate_limit("login:1.2.3.4", opts));

        limiter.reset_attempts("login:1.2.3.4");
        assert!(!limiter.check_rate_limit("login:1.2.3.4", opts));
    }

    #[test]
    fn test_third_attempt_limits() {
        let (limiter, _) = limiter();
        let opts = RateLimitOptions::new().max_attempts(3);

        limiter.record_attempt("k", opts);
        assert!(!limiter.check_rate_limit("k", opts));
        limiter.record_attempt("k", opts);
        assert!(!limiter.check_rate_limit("k", opts));
        limiter.record_attempt("k", opts);
        assert!(limiter.check_rate_limit("k", opts));

        limiter.record_success("k");
        assert!(!limiter.check_rate_limit("k", opts));
        assert_eq!(limiter.attempts("k", opts), 0);
    }

    #[test]
    fn test_missing_key_is_clean() {
        let (limiter, _) = limiter();
        assert!(!limiter.check_rate_limit("nobody", RateLimitOptions::new()));
        assert_eq!(limiter.attempts("nobody", RateLimitOptions::new()), 0);
        limiter.reset_attempts("nobody");
        limiter.record_success("nobody");
        assert!(limiter.is_empty());
    }

    #[test]
    fn test_window_expiry() {
        let (limiter, clock) = limiter();
        let opts = RateLimitOptions::new().max_attempts(2).interval_secs(60);

        limiter.record_attempt("k", opts);
        limiter.record_attempt("k", opts);
        assert!(limiter.check_rate_limit("k", opts));

        // The window is inclusive of its last second.
        clock.advance(Duration::from_secs(60));
        assert!(limiter.check_rate_limit("k", opts));

        clock.advance(Duration::from_secs(1));
        assert!(!limiter.check_rate_limit("k", opts));
        assert_eq!(limiter.attempts("k", opts), 0);

        // A stale window is reset, not incremented.
        limiter.record_attempt("k", opts);
        assert_eq!(limiter.attempts("k", opts), 1);
        assert!(!limiter.check_rate_limit("k", opts));
    }

    #[test]
    fn test_defaults_apply() {
        let (limiter, _) = limiter();
        for _ in 0..4 {
            limiter.record_attempt("k", RateLimitOptions::new());
        }
        assert!(!limiter.check_rate_limit("k", RateLimitOptions::new()));
        limiter.record_attempt("k", RateLimitOptions::new().max_attempts(0));
        assert!(limiter.check_rate_limit("k", RateLimitOptions::new()));
    }

    #[test]
    fn test_keys_are_independent() {
        let (limiter, _) = limiter();
        let opts = RateLimitOptions::new().max_attempts(1);
        limiter.record_attempt("login:a", opts);
        assert!(limiter.check_rate_limit("login:a", opts));
        assert!(!limiter.check_rate_limit("login:b", opts));
    }

    #[test]
    fn test_try_acquire_stops_at_max() {
        let (limiter, clock) = limiter();
        let opts = RateLimitOptions::new().max_attempts(2).interval_secs(10);

        assert!(limiter.try_acquire("k", opts));
        assert!(limiter.try_acquire("k", opts));
        assert!(!limiter.try_acquire("k", opts));
        assert_eq!(limiter.attempts("k", opts), 2);

        clock.advance(Duration::from_secs(11));
        assert!(limiter.try_acquire("k", opts));
        assert_eq!(limiter.attempts("k", opts), 1);
    }

    #[test]
    fn test_try_acquire_concurrent() {
        let limiter = RateLimiter::default();
        let opts = RateLimitOptions::new().max_attempts(50);
        let granted = std::sync::atomic::AtomicU32::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..100 {
                        if limiter.try_acquire("login:shared", opts) {
                            granted.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        assert_eq!(granted.into_inner(), 50);
        assert!(limiter.check_rate_limit("login:shared", opts));
    }

    #[test]
    fn test_record_attempt_concurrent() {
        let limiter = RateLimiter::default();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..250 {
                        limiter.record_attempt("k", RateLimitOptions::new());
                    }
                });
            }
        });
        assert_eq!(limiter.attempts("k", RateLimitOptions::new()), 1000);
    }

    #[test]
    fn test_sweep_uses_each_window_interval() {
        let (limiter, clock) = limiter();
        limiter.record_attempt("short", RateLimitOptions::new().interval_secs(10));
        limiter.record_attempt("long", RateLimitOptions::new().interval_secs(100));

        clock.advance(Duration::from_secs(11));
        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.len(), 1);
        assert_eq!(limiter.attempts("long", RateLimitOptions::new().interval_secs(100)), 1);

        clock.advance(Duration::from_secs(100));
        assert_eq!(limiter.sweep(), 1);
        assert!(limiter.is_empty());
    }

    #[test]
    fn test_invalid_defaults_fall_back() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_attempts: -3,
            interval_secs: 0,
        });
        assert_eq!(limiter.max_attempts(), crate::DEFAULT_MAX_ATTEMPTS);
        assert_eq!(limiter.interval(), crate::DEFAULT_INTERVAL);
    }

    #[test]
    fn test_sweep_keeps_window_extended_by_longer_interval() {
        let (limiter, clock) = limiter();
        let short = RateLimitOptions::new().max_attempts(2).interval_secs(10);
        let long = RateLimitOptions::new().max_attempts(2).interval_secs(900);

        limiter.record_attempt("login:a", short);
        clock.advance(Duration::from_secs(5));
        limiter.record_attempt("login:a", long);
        assert!(limiter.check_rate_limit("login:a", long));

        clock.advance(Duration::from_secs(6));
        assert_eq!(limiter.sweep(), 0);
        assert!(limiter.check_rate_limit("login:a", long));
    }

    #[test]
    fn test_try_acquire_extends_window_for_sweep() {
        let (limiter, clock) = limiter();
        let short = RateLimitOptions::new().max_attempts(2).interval_secs(10);
        let long = RateLimitOptions::new().max_attempts(2).interval_secs(900);

        assert!(limiter.try_acquire("login:b", short));
        assert!(limiter.try_acquire("login:b", long));

        clock.advance(Duration::from_secs(11));
        assert_eq!(limiter.sweep(), 0);
        assert!(!limiter.try_acquire("login:b", long));
    }

    #[test]
    fn test_clear() {
        let (limiter, _) = limiter();
        limiter.record_attempt("a", RateLimitOptions::new());
        limiter.record_attempt("b", RateLimitOptions::new());
        limiter.clear();
        assert!(limiter.is_empty());
    }
}
