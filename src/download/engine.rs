//! Per-archive download engine with skip, retry, throttling and cancellation.
//!
//! # Overview
//!
//! For one [`ArchiveDescriptor`] the engine:
//! 1. decides whether the archive can be skipped ([`skip::decide`])
//! 2. streams the body through an [`AtomicFileWriter`], pausing as told by a
//!    fresh [`RateLimiter`] and reporting a [`ProgressEvent`] per chunk
//! 3. on failure, asks the [`RetryPolicy`] whether to restart from byte zero
//!
//! Every archive ends in exactly one [`TransferOutcome`], and exactly one
//! terminal line (`SAVE`, `SKIP` or `FAIL`) is sent to the [`LogSink`].
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use timelapse_dl_core::download::{CancellationHandle, DownloadEngine, EngineOptions, HttpClient};
//! use timelapse_dl_core::listing::{ArchiveDescriptor, base_url};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(HttpClient::new(Duration::from_secs(60))?);
//! let engine = DownloadEngine::new(client, EngineOptions::default());
//! let archive = ArchiveDescriptor::new(&base_url("192.168.0.90", false)?, "7", "day1.zip");
//! let outcome = engine
//!     .download(&archive, Path::new("."), &CancellationHandle::new())
//!     .await;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::atomic_writer::AtomicFileWriter;
use super::cancel::CancellationHandle;
use super::constants::DEFAULT_RATE_LIMIT_MBPS;
use super::events::{LineKind, LogSink, NoProgress, ProgressEvent, ProgressSink, TracingLog, format_bytes};
use super::rate_limiter::RateLimiter;
use super::retry::{RetryDecision, RetryPolicy, classify_error};
use super::skip::{self, SkipDecision};
use super::transport::Transport;
use super::DownloadError;
use crate::listing::ArchiveDescriptor;

/// Terminal result for one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The archive was committed to `path`.
    Downloaded {
        /// Final location.
        path: PathBuf,
        /// Bytes written.
        bytes: u64,
    },
    /// A satisfactory local copy already existed.
    Skipped(String),
    /// The archive could not be downloaded.
    Failed(String),
}

impl TransferOutcome {
    /// Returns `true` for [`TransferOutcome::Downloaded`].
    #[must_use]
    pub fn is_downloaded(&self) -> bool {
        matches!(self, Self::Downloaded { .. })
    }

    /// Returns `true` for [`TransferOutcome::Skipped`].
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    /// Returns `true` for [`TransferOutcome::Failed`].
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Behaviour switches for the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    /// Re-download even when the destination exists.
    pub overwrite: bool,
    /// Compare local and remote sizes before skipping.
    pub check_size: bool,
    /// Throughput ceiling in megabits per second; `0` disables throttling.
    pub rate_limit_mbps: f64,
    /// Retry ceiling and pause.
    pub retry_policy: RetryPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            check_size: false,
            rate_limit_mbps: DEFAULT_RATE_LIMIT_MBPS,
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// Downloads one archive at a time to a terminal [`TransferOutcome`].
pub struct DownloadEngine {
    transport: Arc<dyn Transport>,
    options: EngineOptions,
    progress: Arc<dyn ProgressSink>,
    log: Arc<dyn LogSink>,
}

impl std::fmt::Debug for DownloadEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadEngine")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl DownloadEngine {
    /// Creates an engine that reports progress nowhere and logs via `tracing`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, options: EngineOptions) -> Self {
        debug!(
            overwrite = options.overwrite,
            check_size = options.check_size,
            rate_limit_mbps = options.rate_limit_mbps,
            max_retries = options.retry_policy.max_retries(),
            "creating download engine"
        );
        Self {
            transport,
            options,
            progress: Arc::new(NoProgress),
            log: Arc::new(TracingLog),
        }
    }

    /// Sets the progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Sets the log sink.
    #[must_use]
    pub fn with_log(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = log;
        self
    }

    /// Runs `archive` to a terminal outcome, storing it under `outdir`.
    ///
    /// Per-archive failures never escape as errors; they become
    /// [`TransferOutcome::Failed`].
    #[instrument(skip(self, archive, cancel), fields(id = %archive.id, url = %archive.url))]
    pub async fn download(
        &self,
        archive: &ArchiveDescriptor,
        outdir: &Path,
        cancel: &CancellationHandle,
    ) -> TransferOutcome {
        let destination = archive.destination_path(outdir);
        let name = archive.local_filename();

        let decision = skip::decide(
            &destination,
            self.options.overwrite,
            self.options.check_size,
            self.transport.as_ref(),
            &archive.url,
        )
        .await;
        match decision {
            SkipDecision::Skip(reason) => {
                self.log.line(LineKind::Skip, &format!("{name} ({reason})"));
                return TransferOutcome::Skipped(reason);
            }
            SkipDecision::ReDownload(reason) => {
                self.log
                    .line(LineKind::Info, &format!("{name}: {reason}, re-downloading"));
            }
            SkipDecision::Proceed => {}
        }

        let policy = &self.options.retry_policy;
        self.log.line(LineKind::Get, &archive.url);

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            if cancel.is_requested() {
                return self.failed(archive, &DownloadError::Cancelled);
            }
            debug!(attempt, "attempting download");

            let error = match self.attempt(archive, &destination, cancel).await {
                Ok(bytes) => {
                    self.log.line(
                        LineKind::Save,
                        &format!("{} ({})", destination.display(), format_bytes(bytes)),
                    );
                    return TransferOutcome::Downloaded {
                        path: destination,
                        bytes,
                    };
                }
                Err(e) => e,
            };

            match policy.should_retry(classify_error(&error), attempt) {
                RetryDecision::Retry { delay, .. } => {
                    info!(
                        attempt,
                        max_attempts = policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "retrying download"
                    );
                    self.log.line(
                        LineKind::Info,
                        &format!(
                            "Attempt {attempt}/{} failed: {error}; retrying in {}s",
                            policy.max_attempts(),
                            delay.as_secs_f64()
                        ),
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            return self.failed(archive, &DownloadError::Cancelled);
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(%reason, attempt, "not retrying download");
                    return self.failed(archive, &error);
                }
            }
        }
    }

    /// One transfer attempt from byte zero. Returns the committed size.
    async fn attempt(
        &self,
        archive: &ArchiveDescriptor,
        destination: &Path,
        cancel: &CancellationHandle,
    ) -> Result<u64, DownloadError> {
        let url = archive.url.as_str();
        let started = Instant::now();

        let body = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DownloadError::Cancelled),
            body = self.transport.get(url) => body?,
        };
        let total = body.content_length;
        let mut chunks = body.chunks;

        let mut writer = AtomicFileWriter::create(destination).await?;
        let mut limiter = RateLimiter::from_mbps(self.options.rate_limit_mbps);
        self.progress.start(archive, total);

        let copied: Result<u64, DownloadError> = async {
            loop {
                let next = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(DownloadError::Cancelled),
                    next = chunks.next() => next,
                };
                let Some(chunk) = next else {
                    break;
                };
                let chunk = chunk?;
                let bytes_so_far = writer.write_chunk(&chunk).await?;
                self.progress.progress(&ProgressEvent {
                    bytes_so_far,
                    total_bytes: total,
                    elapsed: started.elapsed(),
                });

                let pause = limiter.throttle(chunk.len() as u64);
                if !pause.is_zero() {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(DownloadError::Cancelled),
                        () = tokio::time::sleep(pause) => {}
                    }
                }
            }
            Ok(writer.bytes_written())
        }
        .await;
        self.progress.finish();

        let written = match copied {
            Ok(written) => written,
            Err(e) => {
                writer.abort().await;
                return Err(e);
            }
        };
        if let Some(expected) = total
            && written != expected
        {
            warn!(expected, written, "body length does not match Content-Length");
            writer.abort().await;
            return Err(DownloadError::integrity(url, expected, written));
        }

        writer.commit().await?;
        Ok(written)
    }

    fn failed(&self, archive: &ArchiveDescriptor, error: &DownloadError) -> TransferOutcome {
        self.log
            .line(LineKind::Fail, &format!("{}: {error}", archive.local_filename()));
        TransferOutcome::Failed(error.to_string())
    }
}
