//! CLI argument definitions using clap derive macros.
//!
//! Every setting that can also come from the config file is an `Option` here
//! so that an absent flag falls through to the file and then to the built-in
//! default.

use std::path::PathBuf;

use clap::Parser;

/// Download timelapse archives from a network camera.
///
/// Lists the archives stored on the camera, then downloads each one into the
/// output directory, skipping files that are already present.
#[derive(Parser, Debug)]
#[command(name = "timelapse-dl")]
#[command(author, version, about)]
pub struct Args {
    /// Camera hostname or IP address [default: 192.168.0.90]
    #[arg(long)]
    pub host: Option<String>,

    /// Directory to save downloaded files [default: .]
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,

    /// Username for digest auth (e.g. root)
    #[arg(short, long)]
    pub user: Option<String>,

    /// Password for digest auth
    #[arg(long = "pass", env = "TIMELAPSE_PASS", hide_env_values = true)]
    pub password: Option<String>,

    /// Connect and read timeout in seconds (1-3600) [default: 60]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: Option<u64>,

    /// Download rate limit in Mbps, 0 to disable [default: 90]
    #[arg(long, value_parser = parse_rate_limit)]
    pub rate_limit: Option<f64>,

    /// Retries after the first attempt for server and network errors [default: 3]
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Delay in seconds between retries [default: 5]
    #[arg(long)]
    pub retry_delay: Option<u64>,

    /// Check remote file size before skipping existing files
    #[arg(long)]
    pub check_size: bool,

    /// Disable progress bar display
    #[arg(long)]
    pub no_progress: bool,

    /// Overwrite existing files instead of skipping them
    #[arg(long)]
    pub overwrite: bool,

    /// Talk to the camera over HTTPS
    #[arg(long)]
    pub https: bool,

    /// Config file [default: $XDG_CONFIG_HOME/timelapse-dl/config.toml]
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log errors and hide the progress bar
    #[arg(short, long)]
    pub quiet: bool,
}

/// Parses a finite, non-negative Mbps value.
pub(crate) fn parse_rate_limit(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("`{raw}` is not a number"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("`{raw}` must be a finite number >= 0"));
    }
    Ok(value)
}
