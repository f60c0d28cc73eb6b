//! Per-key request throttling.
//!
//! The limiter is injected into [`crate::service::AccountService`] as an
//! `Arc<dyn RateLimiter>`; the default implementation keeps a sliding
//! window of request instants per key in process memory.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// The request is admitted and counted.
    Allowed {
        /// Requests left in the current window after this one.
        remaining: u32,
    },
    /// The request is rejected and not counted.
    Limited {
        /// Time until the oldest counted request leaves the window.
        retry_after: Duration,
    },
}

/// Admission control keyed by an opaque caller identity.
pub trait RateLimiter: Send + Sync + fmt::Debug {
    /// Counts one request for `key` against `limit` requests per window.
    fn check(&self, key: &str, limit: u32) -> RateDecision;
}

/// Sliding-window limiter over a concurrent in-process map.
///
/// Buckets whose requests have all left the window are dropped, either
/// when their key is checked again or by a sweep run at most once per
/// window.
pub struct SlidingWindowLimiter {
    window: Duration,
    hits: Mutex<Buckets>,
}

struct Buckets {
    by_key: HashMap<String, VecDeque<Instant>>,
    last_sweep: Option<Instant>,
}

impl Buckets {
    fn sweep(&mut self, now: Instant, window: Duration) {
        if self
            .last_sweep
            .is_some_and(|at| now.saturating_duration_since(at) < window)
        {
            return;
        }
        self.by_key.retain(|_, bucket| {
            bucket
                .back()
                .is_some_and(|t| now.saturating_duration_since(*t) < window)
        });
        self.last_sweep = Some(now);
    }
}

impl fmt::Debug for SlidingWindowLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlidingWindowLimiter")
            .field("window", &self.window)
            .field("tracked_keys", &self.tracked_keys())
            .finish()
    }
}

impl SlidingWindowLimiter {
    /// Creates a limiter with the given window length.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            hits: Mutex::new(Buckets {
                by_key: HashMap::new(),
                last_sweep: None,
            }),
        }
    }

    /// Number of keys with requests still inside the window.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.hits.lock().by_key.len()
    }

    /// Window length.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    fn check_at(&self, key: &str, limit: u32, now: Instant) -> RateDecision {
        let mut hits = self.hits.lock();
        hits.sweep(now, self.window);
        let bucket = hits.by_key.entry(key.to_string()).or_default();

        while bucket
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= self.window)
        {
            bucket.pop_front();
        }

        let used = u32::try_from(bucket.len()).unwrap_or(u32::MAX);
        if used >= limit {
            let retry_after = bucket.front().map_or(self.window, |oldest| {
                self.window
                    .saturating_sub(now.saturating_duration_since(*oldest))
            });
            if bucket.is_empty() {
                hits.by_key.remove(key);
            }
            return RateDecision::Limited { retry_after };
        }

        bucket.push_back(now);
        RateDecision::Allowed {
            remaining: limit.saturating_sub(used).saturating_sub(1),
        }
    }
}

impl RateLimiter for SlidingWindowLimiter {
    fn check(&self, key: &str, limit: u32) -> RateDecision {
        self.check_at(key, limit, Instant::now())
    }
}
