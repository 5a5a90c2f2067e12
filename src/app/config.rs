//! Application configuration: TOML file defaults merged under CLI flags.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use timelapse_dl_core::auth::Credentials;
use timelapse_dl_core::download::constants::{DEFAULT_RATE_LIMIT_MBPS, DEFAULT_TIMEOUT};
use timelapse_dl_core::download::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};

use crate::cli::Args;

/// Camera address used when neither flag nor file names one.
pub(crate) const DEFAULT_HOST: &str = "192.168.0.90";

const CONFIG_DIR_NAME: &str = "timelapse-dl";
const CONFIG_FILE_NAME: &str = "config.toml";

/// TOML-backed file configuration. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct FileConfig {
    pub(crate) host: Option<String>,
    pub(crate) https: Option<bool>,
    pub(crate) outdir: Option<PathBuf>,
    pub(crate) user: Option<String>,
    pub(crate) password: Option<String>,
    /// Seconds.
    pub(crate) timeout: Option<u64>,
    /// Mbps; `0` disables throttling.
    pub(crate) rate_limit: Option<f64>,
    pub(crate) max_retries: Option<u32>,
    /// Seconds.
    pub(crate) retry_delay: Option<u64>,
    pub(crate) check_size: Option<bool>,
    pub(crate) overwrite: Option<bool>,
    pub(crate) progress: Option<bool>,
}

impl FileConfig {
    /// Validates config values against the same constraints as the CLI.
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(timeout) = self.timeout
            && !(1..=3600).contains(&timeout)
        {
            bail!("Invalid config value for `timeout`: {timeout}. Expected range: 1..=3600");
        }
        if let Some(rate_limit) = self.rate_limit
            && (!rate_limit.is_finite() || rate_limit < 0.0)
        {
            bail!(
                "Invalid config value for `rate_limit`: {rate_limit}. Expected a finite number >= 0"
            );
        }
        if let Some(host) = &self.host
            && host.trim().is_empty()
        {
            bail!("Invalid config value for `host`: must not be empty");
        }
        Ok(())
    }
}

/// Fully merged settings for one run.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) host: String,
    pub(crate) https: bool,
    pub(crate) outdir: PathBuf,
    pub(crate) credentials: Credentials,
    pub(crate) timeout: Duration,
    pub(crate) rate_limit_mbps: f64,
    pub(crate) max_retries: u32,
    pub(crate) retry_delay: Duration,
    pub(crate) check_size: bool,
    pub(crate) overwrite: bool,
    pub(crate) progress: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/timelapse-dl/config.toml`
/// 2. `$HOME/.config/timelapse-dl/config.toml`
pub(crate) fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the file config.
///
/// An explicit path must exist; the default path is optional.
pub(crate) fn load_file_config(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = explicit {
        return read_file_config(path).map(Some);
    }

    match resolve_default_config_path() {
        Some(path) if path.exists() => read_file_config(&path).map(Some),
        _ => Ok(None),
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let cfg: FileConfig = toml::from_str(raw)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Merges CLI flags over file values over built-in defaults.
pub(crate) fn resolve_settings(args: &Args, file: Option<&FileConfig>) -> Result<Settings> {
    let file = file.cloned().unwrap_or_default();

    let Some(user) = args.user.clone().or(file.user) else {
        bail!("Missing username: pass --user or set `user` in the config file");
    };
    let Some(password) = args.password.clone().or(file.password) else {
        bail!("Missing password: pass --pass, set TIMELAPSE_PASS, or set `password` in the config file");
    };

    Ok(Settings {
        host: args
            .host
            .clone()
            .or(file.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        https: args.https || file.https.unwrap_or(false),
        outdir: args
            .outdir
            .clone()
            .or(file.outdir)
            .unwrap_or_else(|| PathBuf::from(".")),
        credentials: Credentials::new(user, password),
        timeout: args
            .timeout
            .or(file.timeout)
            .map_or(DEFAULT_TIMEOUT, Duration::from_secs),
        rate_limit_mbps: args
            .rate_limit
            .or(file.rate_limit)
            .unwrap_or(DEFAULT_RATE_LIMIT_MBPS),
        max_retries: args
            .max_retries
            .or(file.max_retries)
            .unwrap_or(DEFAULT_MAX_RETRIES),
        retry_delay: args
            .retry_delay
            .or(file.retry_delay)
            .map_or(DEFAULT_RETRY_DELAY, Duration::from_secs),
        check_size: args.check_size || file.check_size.unwrap_or(false),
        overwrite: args.overwrite || file.overwrite.unwrap_or(false),
        progress: !args.no_progress && file.progress.unwrap_or(true),
    })
}
