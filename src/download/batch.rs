//! Sequential batch over the archive listing.

use std::path::PathBuf;

use tracing::{info, instrument};

use super::cancel::CancellationHandle;
use super::engine::{DownloadEngine, TransferOutcome};
use crate::listing::ArchiveDescriptor;

/// One archive that ended in [`TransferOutcome::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedArchive {
    /// The archive.
    pub archive: ArchiveDescriptor,
    /// Why it failed.
    pub reason: String,
}

/// Counters and failures accumulated over a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Archives committed to disk.
    pub downloaded: usize,
    /// Archives left alone because a local copy exists.
    pub skipped: usize,
    /// Archives that failed.
    pub failed: usize,
    /// Failed archives in the order they failed.
    pub failures: Vec<FailedArchive>,
    /// Whether the batch stopped early on cancellation.
    pub cancelled: bool,
}

impl BatchSummary {
    /// Number of archives with a terminal outcome.
    #[must_use]
    pub fn total(&self) -> usize {
        self.downloaded + self.skipped + self.failed
    }

    /// Returns whether any archive failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Records the outcome of one archive.
    pub fn record(&mut self, archive: &ArchiveDescriptor, outcome: &TransferOutcome) {
        match outcome {
            TransferOutcome::Downloaded { .. } => self.downloaded += 1,
            TransferOutcome::Skipped(_) => self.skipped += 1,
            TransferOutcome::Failed(reason) => {
                self.failed += 1;
                self.failures.push(FailedArchive {
                    archive: archive.clone(),
                    reason: reason.clone(),
                });
            }
        }
    }

    /// One-line report: `Done. downloaded=N skipped=N failed=N`.
    #[must_use]
    pub fn summary_line(&self) -> String {
        let status = if self.cancelled { "Interrupted" } else { "Done" };
        format!(
            "{status}. downloaded={} skipped={} failed={}",
            self.downloaded, self.skipped, self.failed
        )
    }
}

/// Runs the engine over archives strictly one at a time, in listing order.
#[derive(Debug)]
pub struct BatchRunner {
    engine: DownloadEngine,
    outdir: PathBuf,
}

impl BatchRunner {
    /// Creates a runner storing archives under `outdir`.
    #[must_use]
    pub fn new(engine: DownloadEngine, outdir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            outdir: outdir.into(),
        }
    }

    /// Processes `archives` until exhausted or until cancellation is
    /// requested.
    ///
    /// Cancellation is checked before each archive starts; an archive in
    /// flight is stopped by the engine itself and recorded as failed.
    #[instrument(skip(self, archives, cancel), fields(count = archives.len(), outdir = %self.outdir.display()))]
    pub async fn run(
        &self,
        archives: &[ArchiveDescriptor],
        cancel: &CancellationHandle,
    ) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for archive in archives {
            if cancel.is_requested() {
                info!(
                    processed = summary.total(),
                    remaining = archives.len() - summary.total(),
                    "stopping batch on cancellation"
                );
                break;
            }
            let outcome = self.engine.download(archive, &self.outdir, cancel).await;
            summary.record(archive, &outcome);
        }

        summary.cancelled = cancel.is_requested();
        info!(
            downloaded = summary.downloaded,
            skipped = summary.skipped,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "batch finished"
        );
        summary
    }
}
