//! Archive listing: discovers the timelapse archives stored on the camera.
//!
//! The camera exposes a JSON array of `{ "id": ..., "filename": ... }`
//! objects. Parsing is strict: anything that is not an array of objects with
//! a non-empty `id` and `filename` is rejected rather than partially used.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::Method;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

use crate::download::{DownloadError, HttpClient, filename_from_url};

/// Path of the archive endpoint, relative to the camera root.
pub const ARCHIVES_PATH: &str = "local/timelapseme/archives";

/// Errors fetching or parsing the archive listing.
///
/// Any of these aborts the run before a single archive is attempted.
#[derive(Debug, Error)]
pub enum ListingError {
    /// The listing request could not be completed.
    #[error("failed to fetch archive listing from {url}: {source}")]
    Request {
        /// Listing URL.
        url: String,
        /// Transport failure.
        #[source]
        source: DownloadError,
    },

    /// The camera answered with a non-success status.
    #[error("archive listing at {url} returned HTTP {status}")]
    Status {
        /// Listing URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The body is not a well-formed listing.
    #[error("failed to parse archive listing: {reason}")]
    Parse {
        /// What was wrong with the body.
        reason: String,
    },

    /// The configured host does not form a valid URL.
    #[error("invalid camera host: {host}")]
    InvalidBaseUrl {
        /// The rejected host value.
        host: String,
    },
}

/// One remote archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveDescriptor {
    /// Camera-side identifier.
    pub id: String,
    /// Filename as reported by the camera.
    pub filename: String,
    /// Download URL.
    pub url: String,
}

impl ArchiveDescriptor {
    /// Builds a descriptor, deriving the download URL from `base`.
    #[must_use]
    pub fn new(base: &Url, id: impl Into<String>, filename: impl Into<String>) -> Self {
        let id = id.into();
        let filename = filename.into();
        let url = archive_url(base, &id, &filename);
        Self { id, filename, url }
    }

    /// Local filename, extracted from the download URL.
    #[must_use]
    pub fn local_filename(&self) -> String {
        filename_from_url(&self.url)
    }

    /// Where this archive is stored under `outdir`.
    #[must_use]
    pub fn destination_path(&self, outdir: &Path) -> PathBuf {
        outdir.join(self.local_filename())
    }
}

impl fmt::Display for ArchiveDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (id {})", self.filename, self.id)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawArchive {
    id: RawId,
    filename: String,
}

/// Builds the camera root URL for `host`.
///
/// # Errors
///
/// Returns [`ListingError::InvalidBaseUrl`] if `host` does not form a URL.
pub fn base_url(host: &str, https: bool) -> Result<Url, ListingError> {
    let scheme = if https { "https" } else { "http" };
    let invalid = || ListingError::InvalidBaseUrl {
        host: host.to_string(),
    };
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() || host.contains("://") {
        return Err(invalid());
    }
    let url = Url::parse(&format!("{scheme}://{host}/")).map_err(|_| invalid())?;
    if url.host_str().is_none() || url.path() != "/" {
        return Err(invalid());
    }
    Ok(url)
}

/// Listing URL with a millisecond cache buster.
#[must_use]
pub fn listing_url(base: &Url) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    format!("{base}{ARCHIVES_PATH}?_={millis}")
}

/// Download URL for one archive.
///
/// ```
/// use timelapse_dl_core::listing::archive_url;
/// use url::Url;
///
/// let base = Url::parse("http://192.168.0.90/").unwrap();
/// assert_eq!(
///     archive_url(&base, "7", "front door.zip"),
///     "http://192.168.0.90/local/timelapseme/archives?export=7&file=front%20door.zip"
/// );
/// ```
#[must_use]
pub fn archive_url(base: &Url, id: &str, filename: &str) -> String {
    format!(
        "{base}{ARCHIVES_PATH}?export={}&file={}",
        urlencoding::encode(id),
        urlencoding::encode(filename)
    )
}

/// Parses a listing body into descriptors, in listing order.
///
/// # Errors
///
/// Returns [`ListingError::Parse`] if the body is not a JSON array of objects
/// each carrying a non-empty `id` and `filename`.
pub fn parse_listing(body: &str, base: &Url) -> Result<Vec<ArchiveDescriptor>, ListingError> {
    let raw: Vec<RawArchive> = serde_json::from_str(body).map_err(|e| ListingError::Parse {
        reason: e.to_string(),
    })?;

    raw.into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let id = entry.id.into_string();
            if id.trim().is_empty() {
                return Err(ListingError::Parse {
                    reason: format!("entry {index} has an empty id"),
                });
            }
            if entry.filename.trim().is_empty() {
                return Err(ListingError::Parse {
                    reason: format!("entry {index} has an empty filename"),
                });
            }
            Ok(ArchiveDescriptor::new(base, id, entry.filename))
        })
        .collect()
}

/// Fetches and parses the archive listing.
///
/// # Errors
///
/// Returns [`ListingError`] if the request fails, the camera answers with a
/// non-success status, or the body is not a valid listing.
#[instrument(skip(client), fields(base = %base))]
pub async fn fetch_archives(
    client: &HttpClient,
    base: &Url,
) -> Result<Vec<ArchiveDescriptor>, ListingError> {
    let url = listing_url(base);
    debug!(%url, "fetching archive listing");

    let response = client
        .send(Method::GET, &url)
        .await
        .map_err(|source| ListingError::Request {
            url: url.clone(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ListingError::Status {
            url,
            status: status.as_u16(),
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| ListingError::Request {
            url: url.clone(),
            source: DownloadError::network(url.clone(), e),
        })?;

    let archives = parse_listing(&body, base)?;
    info!(count = archives.len(), "archive listing fetched");
    Ok(archives)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base() -> Url {
        base_url("192.168.0.90", false).unwrap()
    }

    #[test]
    fn test_base_url_schemes() {
        assert_eq!(base_url("cam.local", false).unwrap().as_str(), "http://cam.local/");
        assert_eq!(base_url("cam.local:8443", true).unwrap().as_str(), "https://cam.local:8443/");
        assert_eq!(base_url("cam.local/", false).unwrap().as_str(), "http://cam.local/");
    }

    #[test]
    fn test_base_url_rejects_garbage() {
        for host in ["", "http://cam", "cam/sub/path", "bad host"] {
            assert!(
                matches!(base_url(host, false), Err(ListingError::InvalidBaseUrl { .. })),
                "host {host:?}"
            );
        }
    }

    #[test]
    fn test_listing_url_has_cache_buster() {
        let url = listing_url(&base());
        assert!(url.starts_with("http://192.168.0.90/local/timelapseme/archives?_="));
        let millis = url.rsplit('=').next().unwrap();
        assert!(millis.parse::<u128>().unwrap() > 0);
    }

    #[test]
    fn test_parse_listing_preserves_order_and_builds_urls() {
        let body = r#"[
            {"id": 7, "filename": "day1.zip", "size": 100},
            {"id": "8", "filename": "day 2.zip"}
        ]"#;
        let archives = parse_listing(body, &base()).unwrap();
        assert_eq!(archives.len(), 2);
        assert_eq!(archives[0].id, "7");
        assert_eq!(
            archives[0].url,
            "http://192.168.0.90/local/timelapseme/archives?export=7&file=day1.zip"
        );
        assert_eq!(archives[1].id, "8");
        assert_eq!(archives[1].local_filename(), "day 2.zip");
        assert_eq!(
            archives[1].destination_path(Path::new("/out")),
            PathBuf::from("/out/day 2.zip")
        );
    }

    #[test]
    fn test_parse_empty_listing() {
        assert!(parse_listing("[]", &base()).unwrap().is_empty());
    }

    #[test]
    fn test_parse_listing_fails_closed() {
        let bad_bodies = [
            "not json",
            r#"{"id": 1, "filename": "a.zip"}"#,
            r#"[{"id": 1}]"#,
            r#"[{"filename": "a.zip"}]"#,
            r#"[{"id": 1, "filename": "a.zip"}, 42]"#,
            r#"[{"id": 1, "filename": ""}]"#,
            r#"[{"id": "", "filename": "a.zip"}]"#,
            r#"[{"id": null, "filename": "a.zip"}]"#,
        ];
        for body in bad_bodies {
            assert!(
                matches!(parse_listing(body, &base()), Err(ListingError::Parse { .. })),
                "body {body} should be rejected"
            );
        }
    }

    #[test]
    fn test_archive_url_encodes_filename() {
        assert_eq!(
            archive_url(&base(), "3", "a&b=c.zip"),
            "http://192.168.0.90/local/timelapseme/archives?export=3&file=a%26b%3Dc.zip"
        );
    }

    #[test]
    fn test_descriptor_display() {
        let archive = ArchiveDescriptor::new(&base(), "7", "day1.zip");
        assert_eq!(archive.to_string(), "day1.zip (id 7)");
    }
}
