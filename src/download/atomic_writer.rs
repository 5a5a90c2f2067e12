//! Write-then-rename file placement.
//!
//! [`AtomicFileWriter`] streams bytes into `<destination>.part` in the same
//! directory as the destination and only renames it over the destination on
//! [`commit`](AtomicFileWriter::commit). Any other exit path (an explicit
//! [`abort`](AtomicFileWriter::abort), an early `?` return, a dropped future on
//! cancellation) removes the temporary file, so the destination is always
//! either untouched or complete.

use std::path::PathBuf;

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};

use super::DownloadError;
use super::filename::partial_path;

/// Streams a transfer into a temporary sibling of its destination.
#[derive(Debug)]
pub struct AtomicFileWriter {
    destination: PathBuf,
    temp_path: PathBuf,
    writer: Option<BufWriter<File>>,
    bytes_written: u64,
}

impl AtomicFileWriter {
    /// Creates (or truncates) the temporary file for `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] if the temporary file cannot be created.
    pub async fn create(destination: impl Into<PathBuf>) -> Result<Self, DownloadError> {
        let destination = destination.into();
        let temp_path = partial_path(&destination);
        let file = File::create(&temp_path)
            .await
            .map_err(|e| DownloadError::io(temp_path.clone(), e))?;
        debug!(path = %temp_path.display(), "opened temporary file");
        Ok(Self {
            destination,
            temp_path,
            writer: Some(BufWriter::new(file)),
            bytes_written: 0,
        })
    }

    /// Appends a chunk and returns the running byte count.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] if the write fails.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<u64, DownloadError> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(self.closed_error());
        };
        writer
            .write_all(chunk)
            .await
            .map_err(|e| DownloadError::io(self.temp_path.clone(), e))?;
        self.bytes_written += chunk.len() as u64;
        Ok(self.bytes_written)
    }

    /// Bytes written so far.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flushes the temporary file to disk and renames it over the destination.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] if flushing or renaming fails; the
    /// temporary file is removed in that case.
    pub async fn commit(mut self) -> Result<PathBuf, DownloadError> {
        let Some(mut writer) = self.writer.take() else {
            return Err(self.closed_error());
        };

        let flushed = async {
            writer.flush().await?;
            writer.get_mut().sync_all().await
        }
        .await;
        drop(writer);
        flushed.map_err(|e| DownloadError::io(self.temp_path.clone(), e))?;

        tokio::fs::rename(&self.temp_path, &self.destination)
            .await
            .map_err(|e| DownloadError::io(self.destination.clone(), e))?;

        debug!(
            path = %self.destination.display(),
            bytes = self.bytes_written,
            "committed download"
        );
        // Renamed away: nothing left for Drop to clean up.
        self.temp_path = PathBuf::new();
        Ok(std::mem::take(&mut self.destination))
    }

    /// Discards the temporary file, leaving the destination untouched.
    pub async fn abort(mut self) {
        if let Some(writer) = self.writer.take() {
            drop(writer);
        }
        if let Err(e) = tokio::fs::remove_file(&self.temp_path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %self.temp_path.display(), error = %e, "failed to remove temporary file");
        }
        debug!(path = %self.temp_path.display(), "discarded temporary file");
        self.temp_path = PathBuf::new();
    }

    fn closed_error(&self) -> DownloadError {
        DownloadError::io(
            self.temp_path.clone(),
            std::io::Error::other("temporary file already closed"),
        )
    }
}

impl Drop for AtomicFileWriter {
    fn drop(&mut self) {
        if self.temp_path.as_os_str().is_empty() {
            return;
        }
        // Close the handle before unlinking so Windows can remove it.
        self.writer.take();
        match std::fs::remove_file(&self.temp_path) {
            Ok(()) => debug!(path = %self.temp_path.display(), "removed temporary file on drop"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.temp_path.display(), error = %e, "failed to remove temporary file");
            }
        }
    }
}
