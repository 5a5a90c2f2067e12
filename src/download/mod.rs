//! Archive download engine.
//!
//! This module turns a list of [`ArchiveDescriptor`](crate::listing::ArchiveDescriptor)s
//! into complete local files, one at a time.
//!
//! # Features
//!
//! - Skip-if-present, optionally verified against the remote size
//! - Streaming writes to a `.part` sibling, renamed into place on success
//! - Throughput ceiling over a sliding window
//! - Fixed-delay retries for server and network errors
//! - Cooperative cancellation between chunks and between archives
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use timelapse_dl_core::download::{BatchRunner, CancellationHandle, DownloadEngine, EngineOptions, HttpClient};
//! use timelapse_dl_core::listing::{base_url, fetch_archives};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new(Duration::from_secs(60))?;
//! let archives = fetch_archives(&client, &base_url("192.168.0.90", false)?).await?;
//! let runner = BatchRunner::new(DownloadEngine::new(Arc::new(client), EngineOptions::default()), ".");
//! let summary = runner.run(&archives, &CancellationHandle::new()).await;
//! println!("{}", summary.summary_line());
//! # Ok(())
//! # }
//! ```

mod atomic_writer;
mod batch;
mod cancel;
mod client;
pub mod constants;
mod engine;
mod error;
mod events;
mod filename;
pub mod rate_limiter;
mod retry;
mod skip;
mod transport;

pub use atomic_writer::AtomicFileWriter;
pub use batch::{BatchRunner, BatchSummary, FailedArchive};
pub use cancel::CancellationHandle;
pub use client::HttpClient;
pub use engine::{DownloadEngine, EngineOptions, TransferOutcome};
pub use error::DownloadError;
pub use events::{
    LineKind, LogSink, NoProgress, ProgressEvent, ProgressSink, TracingLog, format_bytes,
};
pub use filename::{FALLBACK_FILENAME, PARTIAL_SUFFIX, filename_from_url, partial_path};
pub use rate_limiter::{RATE_WINDOW, RateLimiter};
pub use retry::{
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, FailureType, RetryDecision, RetryPolicy,
    classify_error,
};
pub use skip::{RemoteSizeLookup, SkipDecision, decide};
pub use transport::{RemoteBody, Transport};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
