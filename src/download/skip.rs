//! Skip-if-present decision for archives that may already be on disk.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, instrument};

/// Looks up the size of a remote archive without transferring it.
#[async_trait]
pub trait RemoteSizeLookup: Send + Sync {
    /// Returns the remote size in bytes, or `None` when it cannot be
    /// determined (request failed, no `Content-Length`).
    async fn remote_size(&self, url: &str) -> Option<u64>;
}

/// Outcome of the skip check for one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipDecision {
    /// Transfer the archive.
    Proceed,
    /// Keep the existing local file.
    Skip(String),
    /// Transfer the archive even though a local file exists.
    ReDownload(String),
}

/// Decides whether the archive at `url` needs to be transferred to
/// `destination`.
///
/// Rules, first match wins:
/// 1. `overwrite` always proceeds.
/// 2. A missing destination proceeds.
/// 3. Without `check_size`, an existing destination is skipped.
/// 4. With `check_size`, the remote size is looked up. An unknown remote size
///    skips (fail open), an equal size skips, a different size re-downloads.
#[instrument(skip(lookup), fields(destination = %destination.display()))]
pub async fn decide<L>(
    destination: &Path,
    overwrite: bool,
    check_size: bool,
    lookup: &L,
    url: &str,
) -> SkipDecision
where
    L: RemoteSizeLookup + ?Sized,
{
    if overwrite {
        return SkipDecision::Proceed;
    }

    let local_size = match tokio::fs::metadata(destination).await {
        Ok(meta) if meta.is_file() => meta.len(),
        Ok(_) | Err(_) => return SkipDecision::Proceed,
    };

    if !check_size {
        return SkipDecision::Skip("already exists".to_string());
    }

    let Some(remote_size) = lookup.remote_size(url).await else {
        debug!("remote size unknown, keeping local copy");
        return SkipDecision::Skip("already exists, cannot verify size".to_string());
    };

    if remote_size == local_size {
        SkipDecision::Skip("already exists, size matches".to_string())
    } else {
        SkipDecision::ReDownload(format!(
            "size mismatch: local={local_size} remote={remote_size}"
        ))
    }
}
