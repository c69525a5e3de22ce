//! Request Admission Control
//!
//! Fixed-window rate limiting keyed by an opaque caller key. The key
//! function lives with the caller (the HTTP layer derives it from
//! forwarded-for headers); unidentified callers share one bucket.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Window length; counters reset when it elapses
pub const WINDOW: Duration = Duration::from_secs(60);

/// Rate limiter configuration
#[derive(Clone, Copy, Debug)]
pub struct RateLimitConfig {
    /// Steady requests per minute
    pub rpm: u32,

    /// Additional allowance on top of `rpm`
    pub burst: u32,
}

impl RateLimitConfig {
    /// Effective per-window ceiling
    pub fn ceiling(&self) -> u32 {
        self.rpm.saturating_add(self.burst)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { rpm: 60, burst: 10 }
    }
}

/// Rejection detail returned to the transport layer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitExceeded {
    /// Remaining whole seconds in the current window (always >= 1)
    pub retry_after_secs: u64,
}

#[derive(Clone, Copy, Debug)]
struct WindowEntry {
    count: u32,
    window_start: Instant,
}

/// Per-key fixed-window counter
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, WindowEntry>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Admit or reject one request for `key`.
    ///
    /// A fresh or elapsed window restarts at count 1 and admits; otherwise
    /// the counter increments and admits while it stays within the
    /// ceiling. The increment-and-compare runs under one short lock, so
    /// concurrent requests cannot double-admit.
    pub fn check(&self, key: &str) -> Result<(), RateLimitExceeded> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), RateLimitExceeded> {
        let mut windows = self.windows.lock().unwrap();

        let entry = windows
            .entry(key.to_string())
            .or_insert(WindowEntry {
                count: 0,
                window_start: now,
            });

        if now.duration_since(entry.window_start) >= WINDOW {
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count += 1;
        if entry.count <= self.config.ceiling() {
            return Ok(());
        }

        let elapsed = now.duration_since(entry.window_start);
        let retry_after_secs = WINDOW.saturating_sub(elapsed).as_secs().max(1);
        tracing::debug!(key, retry_after_secs, "request rejected by rate limiter");
        Err(RateLimitExceeded { retry_after_secs })
    }

    /// Drop windows that have fully elapsed; keeps the key map bounded.
    pub fn prune(&self) {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap();
        windows.retain(|_, entry| now.duration_since(entry.window_start) < WINDOW);
    }
}
