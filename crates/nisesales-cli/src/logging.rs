// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use std::env;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const LOG_ENV: &str = "NISESALES_LOG";
pub const LOG_PATH_ENV: &str = "NISESALES_LOG_PATH";

/// The terminal belongs to the UI, so records go to a file.
pub fn log_path() -> Result<PathBuf> {
    if let Some(path) = env::var_os(LOG_PATH_ENV) {
        return Ok(PathBuf::from(path));
    }
    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set {LOG_PATH_ENV} to a writable log file")
    })?;
    let app_dir = data_root.join(nisesales_db::APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("nisesales.log"))
}

/// `NISESALES_LOG` wins over the configured level when set.
pub fn filter(configured: &str) -> Result<EnvFilter> {
    match env::var(LOG_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .with_context(|| format!("{LOG_ENV}={directives:?} is not a valid log filter")),
        _ => EnvFilter::try_new(configured)
            .with_context(|| format!("log level {configured:?} is not a valid log filter")),
    }
}

pub fn init(configured_level: &str) -> Result<PathBuf> {
    let path = log_path()?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;

    tracing_subscriber::registry()
        .with(filter(configured_level)?)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .map_err(|error| anyhow!("install log subscriber: {error}"))?;
    Ok(path)
}
