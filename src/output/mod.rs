//! CLI output formatting and display helpers.

use timelapse_dl_core::BatchSummary;

/// Printed when the camera reports no archives.
pub const NO_ARCHIVES_MESSAGE: &str = "No timelapse archives found on camera.";

/// Returns terminal width from COLUMNS, or 80 if unset/invalid.
pub fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|width| *width >= 20)
        .unwrap_or(80)
}

/// Truncates text to at most `width` chars, appending ellipsis if truncated.
pub fn truncate_to_width(text: &str, width: usize) -> String {
    let text_len = text.chars().count();
    if text_len <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    if width == 1 {
        return "…".to_string();
    }

    let mut output: String = text.chars().take(width - 1).collect();
    output.push('…');
    output
}

pub(crate) fn fetching_line(host: &str) -> String {
    format!("Fetching timelapse archives from {host}...")
}

pub(crate) fn found_line(count: usize) -> String {
    format!("Found {count} timelapse archive(s) to download.\n")
}

/// Shown on stderr when a cancelled batch stops.
pub const STOPPING_MESSAGE: &str = "\nStopping download process...";

pub(crate) fn stopping_notice(summary: &BatchSummary) -> Option<&'static str> {
    summary.cancelled.then_some(STOPPING_MESSAGE)
}

/// Prints the summary line and, when anything failed, one line per failure.
pub(crate) fn print_run_report(summary: &BatchSummary) {
    println!("\n{}", summary.summary_line());
    for line in render_failure_lines(summary, terminal_width()) {
        eprintln!("{line}");
    }
}

pub(crate) fn render_failure_lines(summary: &BatchSummary, width: usize) -> Vec<String> {
    if summary.failures.is_empty() {
        return Vec::new();
    }

    let mut lines = vec![truncate_to_width("Failed archives:", width)];
    for failure in &summary.failures {
        let reason = failure.reason.lines().next().unwrap_or_default();
        lines.push(truncate_to_width(
            &format!("- {}: {reason}", failure.archive.local_filename()),
            width,
        ));
    }
    if summary
        .failures
        .iter()
        .any(|failure| failure.reason.contains("[AUTH]"))
    {
        lines.push(truncate_to_width(
            "  Fix: check --user/--pass (or TIMELAPSE_PASS) against the camera's accounts.",
            width,
        ));
    }
    lines
}
