//! Timelapse Archive Downloader Library
//!
//! This library provides the core functionality for `timelapse-dl`, which
//! mirrors the timelapse archives recorded by a network camera into a local
//! directory.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`listing`] - Archive discovery via the camera's JSON listing
//! - [`download`] - Skip/retry/throttle download engine and batch runner
//! - [`auth`] - HTTP Digest challenge parsing and response computation

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod download;
pub mod listing;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use download::{
    BatchRunner, BatchSummary, CancellationHandle, DownloadEngine, DownloadError, EngineOptions,
    HttpClient, RateLimiter, RetryPolicy, TransferOutcome,
};
pub use listing::{ArchiveDescriptor, ListingError, fetch_archives};
