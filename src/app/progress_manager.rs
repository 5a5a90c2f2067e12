//! Console rendering: per-archive progress bar plus classified lines.

use std::sync::{Mutex, PoisonError};

use indicatif::{ProgressBar, ProgressStyle};
use timelapse_dl_core::ArchiveDescriptor;
use timelapse_dl_core::download::{LineKind, LogSink, ProgressEvent, ProgressSink};

const BAR_TEMPLATE: &str =
    "{wide_bar} {percent:>3}% {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const SPINNER_TEMPLATE: &str = "{spinner} {bytes} ({bytes_per_sec})";

/// Prints engine lines to the console and, when enabled, draws a bar for
/// the archive in flight.
#[derive(Debug)]
pub(crate) struct ConsoleReporter {
    show_progress: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleReporter {
    pub(crate) fn new(show_progress: bool) -> Self {
        Self {
            show_progress,
            bar: Mutex::new(None),
        }
    }

    fn with_bar<R>(&self, f: impl FnOnce(&mut Option<ProgressBar>) -> R) -> R {
        let mut guard = self.bar.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

pub(crate) fn format_line(kind: LineKind, message: &str) -> String {
    format!("{:<6}{message}", kind.tag())
}

fn new_bar(total_bytes: Option<u64>) -> ProgressBar {
    match total_bytes {
        Some(total) => {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template(BAR_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template(SPINNER_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar
        }
    }
}

impl ProgressSink for ConsoleReporter {
    fn start(&self, _archive: &ArchiveDescriptor, total_bytes: Option<u64>) {
        if !self.show_progress {
            return;
        }
        self.with_bar(|slot| {
            if let Some(previous) = slot.take() {
                previous.finish_and_clear();
            }
            *slot = Some(new_bar(total_bytes));
        });
    }

    fn progress(&self, event: &ProgressEvent) {
        self.with_bar(|slot| {
            if let Some(bar) = slot.as_ref() {
                bar.set_position(event.bytes_so_far);
            }
        });
    }

    fn finish(&self) {
        self.with_bar(|slot| {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        });
    }
}

impl LogSink for ConsoleReporter {
    fn line(&self, kind: LineKind, message: &str) {
        let text = format_line(kind, message);
        let print = || {
            if kind == LineKind::Fail {
                eprintln!("{text}");
            } else {
                println!("{text}");
            }
        };
        self.with_bar(|slot| match slot.as_ref() {
            Some(bar) => bar.suspend(print),
            None => print(),
        });
    }
}
