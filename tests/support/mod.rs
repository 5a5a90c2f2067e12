//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod socket_guard;

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use timelapse_dl_core::download::{LineKind, LogSink, RemoteBody, RemoteSizeLookup, Transport};
use timelapse_dl_core::{ArchiveDescriptor, DownloadError};
use url::Url;

/// What the fake camera does for one GET.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Non-2xx status.
    Status(u16),
    /// Full body, advertised with its length, in chunks of `chunk` bytes.
    Body { data: Vec<u8>, chunk: usize },
    /// Advertises `data.len()` bytes but drops the connection after `cut_at`.
    CutAt { data: Vec<u8>, cut_at: usize },
}

impl Reply {
    pub fn body(data: &[u8]) -> Self {
        Self::Body {
            data: data.to_vec(),
            chunk: 4096,
        }
    }
}

/// In-memory camera: replies are consumed in order, the last one repeats.
#[derive(Debug)]
pub struct FakeCamera {
    replies: Mutex<VecDeque<Reply>>,
    last: Mutex<Option<Reply>>,
    remote_size: Option<u64>,
    gets: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl FakeCamera {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            remote_size: None,
            gets: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn with_remote_size(mut self, size: u64) -> Self {
        self.remote_size = Some(size);
        self
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    fn next_reply(&self) -> Reply {
        let mut replies = self.replies.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        if let Some(reply) = replies.pop_front() {
            *last = Some(reply.clone());
            return reply;
        }
        last.clone().unwrap_or(Reply::Status(404))
    }
}

#[async_trait]
impl RemoteSizeLookup for FakeCamera {
    async fn remote_size(&self, _url: &str) -> Option<u64> {
        self.remote_size
    }
}

#[async_trait]
impl Transport for FakeCamera {
    async fn get(&self, url: &str) -> Result<RemoteBody, DownloadError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(url.to_string());

        match self.next_reply() {
            Reply::Status(status) => Err(DownloadError::http_status(url, status)),
            Reply::Body { data, chunk } => {
                let length = data.len() as u64;
                let chunks: Vec<Result<Bytes, DownloadError>> = data
                    .chunks(chunk.max(1))
                    .map(|c| Ok(Bytes::copy_from_slice(c)))
                    .collect();
                Ok(RemoteBody {
                    content_length: Some(length),
                    chunks: futures_util::stream::iter(chunks).boxed(),
                })
            }
            Reply::CutAt { data, cut_at } => {
                let length = data.len() as u64;
                let head = Bytes::copy_from_slice(&data[..cut_at.min(data.len())]);
                let url = url.to_string();
                let chunks: Vec<Result<Bytes, DownloadError>> =
                    vec![Ok(head), Err(DownloadError::timeout(url))];
                Ok(RemoteBody {
                    content_length: Some(length),
                    chunks: futures_util::stream::iter(chunks).boxed(),
                })
            }
        }
    }
}

/// Records every classified line.
#[derive(Default)]
pub struct RecordingLog {
    lines: Mutex<Vec<(LineKind, String)>>,
}

impl RecordingLog {
    pub fn lines(&self) -> Vec<(LineKind, String)> {
        self.lines.lock().unwrap().clone()
    }

    pub fn count(&self, kind: LineKind) -> usize {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }
}

impl LogSink for RecordingLog {
    fn line(&self, kind: LineKind, message: &str) {
        self.lines.lock().unwrap().push((kind, message.to_string()));
    }
}

/// Runs `hook` with the running SAVE count after every SAVE line.
pub struct OnSave<F> {
    saves: AtomicUsize,
    hook: F,
    pub inner: Arc<RecordingLog>,
}

impl<F: Fn(usize) + Send + Sync> OnSave<F> {
    pub fn new(hook: F) -> Self {
        Self {
            saves: AtomicUsize::new(0),
            hook,
            inner: Arc::new(RecordingLog::default()),
        }
    }
}

impl<F: Fn(usize) + Send + Sync> LogSink for OnSave<F> {
    fn line(&self, kind: LineKind, message: &str) {
        self.inner.line(kind, message);
        if kind == LineKind::Save {
            let saves = self.saves.fetch_add(1, Ordering::SeqCst) + 1;
            (self.hook)(saves);
        }
    }
}

pub fn camera_base() -> Url {
    Url::parse("http://camera.test/").unwrap()
}

pub fn archives(count: usize) -> Vec<ArchiveDescriptor> {
    let base = camera_base();
    (1..=count)
        .map(|i| ArchiveDescriptor::new(&base, i.to_string(), format!("day{i}.zip")))
        .collect()
}

/// Names of every entry in `dir`, sorted.
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
