//! Progress events and classified log lines emitted by the engine.
//!
//! The engine never renders anything itself: it reports through a
//! [`ProgressSink`] and a [`LogSink`], and the host decides how to show them.

use std::fmt;
use std::time::Duration;

use crate::listing::ArchiveDescriptor;

/// Snapshot of a transfer after a chunk was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Bytes written to the temporary file so far in this attempt.
    pub bytes_so_far: u64,
    /// Total size from `Content-Length`, when the server sent one.
    pub total_bytes: Option<u64>,
    /// Time since the attempt's first byte was requested.
    pub elapsed: Duration,
}

/// Receives per-chunk progress for the archive currently in flight.
pub trait ProgressSink: Send + Sync {
    /// A transfer attempt for `archive` has started.
    fn start(&self, archive: &ArchiveDescriptor, total_bytes: Option<u64>);

    /// A chunk was written.
    fn progress(&self, event: &ProgressEvent);

    /// The attempt ended (successfully or not).
    fn finish(&self);
}

/// Progress sink used when progress display is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn start(&self, _archive: &ArchiveDescriptor, _total_bytes: Option<u64>) {}

    fn progress(&self, _event: &ProgressEvent) {}

    fn finish(&self) {}
}

/// Classification of a user-visible log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKind {
    /// A transfer request is about to be issued.
    Get,
    /// An archive was committed to disk.
    Save,
    /// An archive was skipped.
    Skip,
    /// Informational: size mismatch, retry notices.
    Info,
    /// An archive failed.
    Fail,
}

impl LineKind {
    /// Tag printed in front of the line.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Save => "SAVE",
            Self::Skip => "SKIP",
            Self::Info => "INFO",
            Self::Fail => "FAIL",
        }
    }
}

impl fmt::Display for LineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Receives classified lines for user visibility.
pub trait LogSink: Send + Sync {
    /// Emits one line.
    fn line(&self, kind: LineKind, message: &str);
}

/// Log sink that forwards lines to `tracing` only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl LogSink for TracingLog {
    fn line(&self, kind: LineKind, message: &str) {
        match kind {
            LineKind::Fail => tracing::warn!(kind = %kind, "{message}"),
            _ => tracing::info!(kind = %kind, "{message}"),
        }
    }
}

/// Formats a byte count with binary units, e.g. `1.50 MB`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{value:.2} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.2} TB")
}
