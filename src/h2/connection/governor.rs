//! Per-connection security governor (spec §4.8 "Security governor"): a
//! buffer-size counter guarding against unbounded memory growth, and a
//! windowed token bucket rate-limiting PRIORITY frames from a hostile peer.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovernorError {
    BufferSizeExceeded,
    RateLimitExceeded,
}

impl std::fmt::Display for GovernorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GovernorError::BufferSizeExceeded => write!(f, "connection buffer size exceeded"),
            GovernorError::RateLimitExceeded => write!(f, "PRIORITY rate limit exceeded"),
        }
    }
}

impl std::error::Error for GovernorError {}

/// Tracks the connection-wide byte total contributed by every stream's
/// receive buffer and send buffer (spec §4.8 "Connection buffer counter").
///
/// An `AtomicI64` rather than `u64` so a failed speculative increment can be
/// rolled back with a plain `fetch_sub` without worrying about underflow
/// wrapping; the logical value is never allowed to go negative.
pub struct BufferGovernor {
    current: AtomicI64,
    max: i64,
}

impl BufferGovernor {
    pub fn new(max: u64) -> Self {
        BufferGovernor {
            current: AtomicI64::new(0),
            max: max as i64,
        }
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Relaxed).max(0) as u64
    }

    /// Speculatively adds `n` bytes to the running total; rolls back and
    /// returns `BufferSizeExceeded` if that would cross `max`.
    pub fn try_grow(&self, n: u64) -> Result<(), GovernorError> {
        let after = self.current.fetch_add(n as i64, Ordering::SeqCst) + n as i64;
        if after > self.max {
            self.current.fetch_sub(n as i64, Ordering::SeqCst);
            return Err(GovernorError::BufferSizeExceeded);
        }
        Ok(())
    }

    /// Called when a stream's `read` drains bytes out of its buffer.
    pub fn shrink(&self, n: u64) {
        self.current.fetch_sub(n as i64, Ordering::SeqCst);
    }
}

/// Windowed token bucket: up to `capacity` admissions per `window`,
/// refilling fully at the start of each window (spec §4.8 "PRIORITY rate
/// limiter").
pub struct RateLimiter {
    inner: Mutex<Bucket>,
    capacity: u32,
    window: Duration,
}

struct Bucket {
    remaining: u32,
    window_started: Instant,
}

impl RateLimiter {
    pub fn new(capacity: u32, window: Duration) -> Self {
        RateLimiter {
            inner: Mutex::new(Bucket {
                remaining: capacity,
                window_started: Instant::now(),
            }),
            capacity,
            window,
        }
    }

    /// Consumes one token if available; fails with `RateLimitExceeded` once
    /// the current window's budget is exhausted.
    pub fn try_admit(&self) -> Result<(), GovernorError> {
        let mut bucket = self.inner.lock();
        let now = Instant::now();
        if now.duration_since(bucket.window_started) >= self.window {
            bucket.remaining = self.capacity;
            bucket.window_started = now;
        }
        if bucket.remaining == 0 {
            return Err(GovernorError::RateLimitExceeded);
        }
        bucket.remaining -= 1;
        Ok(())
    }
}

/// Per-stream buffer cap plus the two connection-wide governors above; owned
/// by a [`crate::h2::connection::Connection`].
pub struct SecurityGovernor {
    pub buffer: BufferGovernor,
    pub priority_rate: RateLimiter,
    pub stream_buffer_cap: usize,
}

impl SecurityGovernor {
    pub fn new(max_connection_buffer: u64, priority_rate_cap: u32, priority_window: Duration, stream_buffer_cap: usize) -> Self {
        SecurityGovernor {
            buffer: BufferGovernor::new(max_connection_buffer),
            priority_rate: RateLimiter::new(priority_rate_cap, priority_window),
            stream_buffer_cap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_governor_rolls_back_on_exceed() {
        let gov = BufferGovernor::new(100);
        gov.try_grow(60).unwrap();
        assert_eq!(gov.try_grow(60), Err(GovernorError::BufferSizeExceeded));
        assert_eq!(gov.current(), 60, "failed grow must not stick");
    }

    #[test]
    fn buffer_governor_shrink_on_read() {
        let gov = BufferGovernor::new(100);
        gov.try_grow(50).unwrap();
        gov.shrink(30);
        assert_eq!(gov.current(), 20);
    }

    #[test]
    fn rate_limiter_exhausts_then_refills_next_window() {
        let limiter = RateLimiter::new(2, Duration::from_millis(20));
        assert!(limiter.try_admit().is_ok());
        assert!(limiter.try_admit().is_ok());
        assert_eq!(limiter.try_admit(), Err(GovernorError::RateLimitExceeded));
        std::thread::sleep(Duration::from_millis(25));
        assert!(limiter.try_admit().is_ok());
    }
}
