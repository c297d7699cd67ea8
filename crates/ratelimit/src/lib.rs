//! Login throttling.
//!
//! A [`RateLimiter`] counts attempts per key inside a fixed window and
//! reports a key as limited once the count reaches the maximum. Expired
//! windows are treated as clean and reset lazily on the next attempt;
//! [`spawn_sweeper`] evicts them in the background so idle keys do not pile
//! up for the lifetime of the process.
//!
//! ```
//! use ratelimit::{RateLimitOptions, RateLimiter};
//!
//! let limiter = RateLimiter::default();
//! let opts = RateLimitOptions::new().max_attempts(3);
//! let key = "login:203.0.113.9";
//!
//! for _ in 0..3 {
//!     assert!(!limiter.check_rate_limit(key, opts));
//!     limiter.record_attempt(key, opts);
//! }
//! assert!(limiter.check_rate_limit(key, opts));
//!
//! limiter.record_success(key);
//! assert!(!limiter.check_rate_limit(key, opts));
//! ```
//!
//! State lives in this process only. Several instances behind a load
//! balancer each enforce their own count.

mod clock;
mod config;
mod limiter;
mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DEFAULT_INTERVAL, DEFAULT_MAX_ATTEMPTS, RateLimitConfig, RateLimitOptions};
pub use limiter::RateLimiter;
pub use sweeper::spawn_sweeper;
