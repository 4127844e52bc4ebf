//! Logging setup
//!
//! The terminal belongs to the UI, so logs go to `~/.parley/logs/parley.log`.
//! The filter comes from the config (or `--log-level`), never from the
//! environment.

use anyhow::{anyhow, Context, Result};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

const LOG_FILE_NAME: &str = "parley.log";

/// Build the filter, falling back to `info` for an unparsable directive.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|err| {
        eprintln!("Warning: invalid log level '{}' ({}), falling back to info", level, err);
        EnvFilter::new("info")
    })
}

/// Install the global subscriber writing to the log file. Returns its path.
pub fn init(config: &Config) -> Result<PathBuf> {
    init_in(&config.log_dir()?, &config.log_level)
}

pub fn init_in(dir: &Path, level: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let path = dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(build_filter(level))
        .with_ansi(false)
        .with_target(true)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|err| anyhow!("Failed to install log subscriber: {}", err))?;

    Ok(path)
}
