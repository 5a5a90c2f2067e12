//! Throughput limiting for a single archive transfer.
//!
//! The [`RateLimiter`] keeps a short log of recent chunk writes and tells the
//! copy loop how long to pause so that the average rate over the sliding
//! window stays under the configured ceiling.
//!
//! # Example
//!
//! ```
//! use timelapse_dl_core::download::RateLimiter;
//!
//! // 90 Mbps ceiling
//! let mut limiter = RateLimiter::from_mbps(90.0);
//!
//! // The first chunk never pauses
//! assert!(limiter.throttle(1024 * 1024).is_zero());
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

/// Length of the sliding window the average rate is computed over.
pub const RATE_WINDOW: Duration = Duration::from_secs(2);

/// Per-transfer byte-rate limiter.
///
/// One instance per active transfer; it is only ever touched from that
/// transfer's sequential copy loop, so it carries no synchronization.
#[derive(Debug)]
pub struct RateLimiter {
    /// Ceiling in bytes per second, `None` when throttling is disabled.
    bytes_per_sec: Option<f64>,

    /// Start of the interval the logged writes are measured against.
    /// `None` until the first chunk has been seen.
    anchor: Option<Instant>,

    /// Writes inside the window: (effective completion time, bytes).
    events: VecDeque<(Instant, u64)>,

    /// Sum of the bytes in `events`.
    window_bytes: u64,
}

impl RateLimiter {
    /// Creates a limiter with a ceiling expressed in bits per second.
    ///
    /// A non-finite or non-positive ceiling disables throttling.
    #[must_use]
    pub fn new(bits_per_sec: f64) -> Self {
        let bytes_per_sec = (bits_per_sec.is_finite() && bits_per_sec > 0.0)
            .then_some(bits_per_sec / 8.0);
        debug!(?bytes_per_sec, "creating rate limiter");
        Self {
            bytes_per_sec,
            anchor: None,
            events: VecDeque::new(),
            window_bytes: 0,
        }
    }

    /// Creates a limiter from a ceiling in megabits per second (10^6 bits).
    #[must_use]
    pub fn from_mbps(mbps: f64) -> Self {
        Self::new(mbps * 1_000_000.0)
    }

    /// Creates a limiter that never pauses.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(0.0)
    }

    /// Returns whether throttling is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.bytes_per_sec.is_none()
    }

    /// Records `bytes_just_written` and returns how long the caller must pause
    /// before writing more.
    pub fn throttle(&mut self, bytes_just_written: u64) -> Duration {
        self.throttle_at(bytes_just_written, Instant::now())
    }

    /// [`throttle`](Self::throttle) with an explicit clock reading.
    pub fn throttle_at(&mut self, bytes_just_written: u64, now: Instant) -> Duration {
        let Some(rate) = self.bytes_per_sec else {
            return Duration::ZERO;
        };

        // The first chunk only starts the clock.
        let Some(anchor) = self.anchor else {
            self.anchor = Some(now);
            trace!(bytes = bytes_just_written, "first chunk, no pause");
            return Duration::ZERO;
        };

        self.evict_expired(now);
        let anchor = self.anchor.unwrap_or(anchor);

        let window_bytes = self.window_bytes.saturating_add(bytes_just_written);
        #[allow(clippy::cast_precision_loss)]
        let required = Duration::try_from_secs_f64(window_bytes as f64 / rate)
            .unwrap_or(Duration::MAX);
        let elapsed = now.saturating_duration_since(anchor);
        let pause = required.saturating_sub(elapsed);

        self.events.push_back((now + pause, bytes_just_written));
        self.window_bytes = window_bytes;

        if !pause.is_zero() {
            trace!(
                window_bytes,
                pause_ms = pause.as_millis(),
                "throttling transfer"
            );
        }
        pause
    }

    /// Drops writes older than the window, moving the anchor forward so the
    /// remaining writes are measured against the time they actually occupied.
    fn evict_expired(&mut self, now: Instant) {
        while let Some(&(at, bytes)) = self.events.front() {
            if now.saturating_duration_since(at) <= RATE_WINDOW {
                break;
            }
            self.events.pop_front();
            self.window_bytes = self.window_bytes.saturating_sub(bytes);
            self.anchor = Some(at);
        }
    }
}
