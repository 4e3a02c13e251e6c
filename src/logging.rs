//! Logging setup: tracing subscriber writing to the per-run log file

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

pub const LOG_FILE_NAME: &str = "insight.log";

/// Builds the filter used when `RUST_LOG` is not set.
pub fn default_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug,reqwest=info,hyper=info,h2=info,hyper_util=info,rustls=info,sqlx=info")
    } else {
        EnvFilter::new("info,reqwest=warn,hyper=warn,h2=warn,hyper_util=warn,rustls=warn,sqlx=warn")
    }
}

/// Installs the global subscriber. Log lines are appended to `<output>/log/insight.log`.
pub fn init(config: &Config) -> Result<()> {
    let log_dir = config.log_dir();
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {:?}", log_dir))?;

    let log_path = log_dir.join(LOG_FILE_NAME);
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(config.verbose));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))?;

    Ok(())
}
