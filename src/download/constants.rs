//! Constants for the download module (timeouts, throttling, identification).

use std::time::Duration;

/// Default connect and per-read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default throughput ceiling in megabits per second.
pub const DEFAULT_RATE_LIMIT_MBPS: f64 = 90.0;

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("timelapse-dl/", env!("CARGO_PKG_VERSION"));
