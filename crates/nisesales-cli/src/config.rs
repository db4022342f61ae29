// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use nisesales_app::{AutoScrollConfig, ViewMode, WorkspaceOptions};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const CONFIG_VERSION: i64 = 1;
pub const CONFIG_PATH_ENV: &str = "NISESALES_CONFIG_PATH";
const DEFAULT_REMOTE_TIMEOUT: &str = "10s";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Sqlite,
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub remote: Remote,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            remote: Remote::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub backend: Option<BackendKind>,
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Remote {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ui {
    pub user_name: Option<String>,
    pub default_view: Option<String>,
    pub autoscroll_margin_rows: Option<u16>,
    pub autoscroll_min_speed: Option<f32>,
    pub autoscroll_max_speed: Option<f32>,
    pub autoscroll_tick_ms: Option<u64>,
    pub autoscroll_step_rows: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub level: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;

        let app_dir = config_root.join(nisesales_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version. Add `version = 1` at the top and keep values under [storage], [remote], [ui], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(db_path) = &self.storage.db_path {
            nisesales_db::validate_db_path(db_path)
                .with_context(|| format!("invalid storage.db_path in {}", path.display()))?;
        }

        if self.backend() == BackendKind::Remote {
            if self.remote_url().is_none() {
                bail!(
                    "storage.backend = \"remote\" in {} needs [remote].url, for example https://<project>.supabase.co/rest/v1",
                    path.display()
                );
            }
            if self.remote_api_key().is_none() {
                bail!(
                    "storage.backend = \"remote\" in {} needs [remote].api_key",
                    path.display()
                );
            }
        }

        if let Some(timeout) = &self.remote.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed.is_zero() {
                bail!(
                    "remote.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(view) = &self.ui.default_view
            && ViewMode::parse(view).is_none()
        {
            bail!(
                "ui.default_view in {} must be \"list\" or \"representative\", got {view:?}",
                path.display()
            );
        }

        let autoscroll = self.autoscroll();
        if !(autoscroll.min_speed > 0.0 && autoscroll.max_speed >= autoscroll.min_speed) {
            bail!(
                "ui.autoscroll_min_speed and ui.autoscroll_max_speed in {} must satisfy 0 < min <= max, got {} and {}",
                path.display(),
                autoscroll.min_speed,
                autoscroll.max_speed
            );
        }
        if autoscroll.tick.is_zero() {
            bail!(
                "ui.autoscroll_tick_ms in {} must be positive",
                path.display()
            );
        }
        if autoscroll.step_rows == 0 {
            bail!(
                "ui.autoscroll_step_rows in {} must be positive",
                path.display()
            );
        }

        if let Some(level) = &self.log.level {
            EnvFilter::try_new(level).with_context(|| {
                format!(
                    "log.level {level:?} in {} is not a valid filter; use error, warn, info, debug or trace",
                    path.display()
                )
            })?;
        }

        Ok(())
    }

    pub fn backend(&self) -> BackendKind {
        self.storage.backend.unwrap_or_default()
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => nisesales_db::default_db_path(),
        }
    }

    pub fn remote_url(&self) -> Option<&str> {
        non_empty(self.remote.url.as_deref()).map(|url| url.trim_end_matches('/'))
    }

    pub fn remote_api_key(&self) -> Option<&str> {
        non_empty(self.remote.api_key.as_deref())
    }

    pub fn remote_timeout(&self) -> Result<Duration> {
        parse_duration(
            self.remote
                .timeout
                .as_deref()
                .unwrap_or(DEFAULT_REMOTE_TIMEOUT),
        )
    }

    pub fn user_name(&self) -> &str {
        self.ui.user_name.as_deref().unwrap_or("").trim()
    }

    pub fn default_view(&self) -> ViewMode {
        self.ui
            .default_view
            .as_deref()
            .and_then(ViewMode::parse)
            .unwrap_or(ViewMode::ByList)
    }

    pub fn autoscroll(&self) -> AutoScrollConfig {
        let defaults = AutoScrollConfig::default();
        AutoScrollConfig {
            margin_rows: self
                .ui
                .autoscroll_margin_rows
                .unwrap_or(defaults.margin_rows),
            min_speed: self.ui.autoscroll_min_speed.unwrap_or(defaults.min_speed),
            max_speed: self.ui.autoscroll_max_speed.unwrap_or(defaults.max_speed),
            tick: self
                .ui
                .autoscroll_tick_ms
                .map_or(defaults.tick, Duration::from_millis),
            step_rows: self.ui.autoscroll_step_rows.unwrap_or(defaults.step_rows),
        }
    }

    pub fn workspace_options(&self) -> WorkspaceOptions {
        WorkspaceOptions {
            autoscroll: self.autoscroll(),
            default_view: self.default_view(),
        }
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn example_config(path: &Path) -> String {
        let autoscroll = AutoScrollConfig::default();
        format!(
            "# nisesales config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# \"sqlite\" (local file) or \"remote\" (PostgREST endpoint)\nbackend = \"sqlite\"\n# Optional. Default is platform data dir (for example ~/.local/share/nisesales/nisesales.db)\n# db_path = \"/absolute/path/to/nisesales.db\"\n\n[remote]\n# url = \"https://<project>.supabase.co/rest/v1\"\n# api_key = \"<anon key>\"\ntimeout = \"{}\"\n\n[ui]\nuser_name = \"\"\n# \"list\" or \"representative\"\ndefault_view = \"list\"\nautoscroll_margin_rows = {}\nautoscroll_min_speed = {:.1}\nautoscroll_max_speed = {:.1}\nautoscroll_tick_ms = {}\nautoscroll_step_rows = {}\n\n[log]\n# NISESALES_LOG overrides this\nlevel = \"{}\"\n",
            path.display(),
            DEFAULT_REMOTE_TIMEOUT,
            autoscroll.margin_rows,
            autoscroll.min_speed,
            autoscroll.max_speed,
            autoscroll.tick.as_millis(),
            autoscroll.step_rows,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 10s)")
}
