//! Exit code logic for the downloader process.
//!
//! Single responsibility: map a finished batch to the process exit outcome.

use timelapse_dl_core::BatchSummary;

use crate::ProcessExit;

/// Determines the process exit outcome from a batch summary.
///
/// Cancellation wins over failures, so an interrupted run exits 130 even
/// when the archive in flight was recorded as failed.
pub(crate) fn determine_exit_outcome(summary: &BatchSummary) -> ProcessExit {
    if summary.cancelled {
        ProcessExit::Interrupted
    } else if summary.has_failures() {
        ProcessExit::Failure
    } else {
        ProcessExit::Success
    }
}
