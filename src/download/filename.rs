//! Filename extraction and sanitization for archive downloads.

use std::path::{Path, PathBuf};

use tracing::debug;
use url::Url;

/// Name used when a URL yields neither a `file` parameter nor a path segment.
pub const FALLBACK_FILENAME: &str = "download.bin";

/// Suffix of the temporary sibling written while a transfer is in flight.
pub const PARTIAL_SUFFIX: &str = ".part";

/// Derives the local filename for a download URL.
///
/// Priority:
/// 1. basename of the `file` query parameter
/// 2. last path segment
/// 3. [`FALLBACK_FILENAME`]
///
/// ```
/// use timelapse_dl_core::download::filename_from_url;
///
/// assert_eq!(filename_from_url("http://cam/archives?export=7&file=day1.zip"), "day1.zip");
/// assert_eq!(filename_from_url("http://cam/a/b/c.mp4"), "c.mp4");
/// assert_eq!(filename_from_url("http://cam/"), "download.bin");
/// ```
#[must_use]
pub fn filename_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        debug!(%url, "unparseable URL, using fallback filename");
        return FALLBACK_FILENAME.to_string();
    };

    let from_query = parsed
        .query_pairs()
        .find(|(key, value)| key == "file" && !value.is_empty())
        .and_then(|(_, value)| basename(&value));
    if let Some(name) = from_query {
        return sanitize_filename(&name);
    }

    let from_path = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back().map(str::to_string))
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            urlencoding::decode(&segment)
                .map(std::borrow::Cow::into_owned)
                .unwrap_or(segment)
        })
        .and_then(|decoded| basename(&decoded));
    if let Some(name) = from_path {
        return sanitize_filename(&name);
    }

    FALLBACK_FILENAME.to_string()
}

/// Returns the path of the in-progress sibling for `destination`.
#[must_use]
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_else(|| FALLBACK_FILENAME.into());
    name.push(PARTIAL_SUFFIX);
    destination.with_file_name(name)
}

/// Last component of a `/`- or `\`-separated value, rejecting `.`/`..`.
fn basename(value: &str) -> Option<String> {
    let last = value.rsplit(['/', '\\']).next()?.trim();
    if last.is_empty() || last == "." || last == ".." {
        return None;
    }
    Some(last.to_string())
}

/// Sanitizes a filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        sanitized
    }
}
