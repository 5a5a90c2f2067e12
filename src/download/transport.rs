//! Transport seam between the engine and the network.
//!
//! [`HttpClient`](super::HttpClient) is the production implementation; tests
//! substitute in-memory transports to inject faults at exact byte offsets.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;

use super::DownloadError;
use super::skip::RemoteSizeLookup;

/// Streaming body of a successful GET.
pub struct RemoteBody {
    /// Value of the `Content-Length` header, if present.
    pub content_length: Option<u64>,
    /// Body chunks in arrival order.
    pub chunks: BoxStream<'static, Result<Bytes, DownloadError>>,
}

impl std::fmt::Debug for RemoteBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBody")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Issues the authenticated requests the engine needs.
#[async_trait]
pub trait Transport: RemoteSizeLookup {
    /// Starts a GET for `url`.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] for network failures and for any non-2xx
    /// status (auth statuses as [`DownloadError::AuthRequired`]).
    async fn get(&self, url: &str) -> Result<RemoteBody, DownloadError>;
}
