//! Configuration for the cectray daemon.
//!
//! TOML file at the platform config dir, merged with `CECTRAY_` environment
//! variables, and translation to the runtime `ControllerConfig` and
//! `MonitorConfig` types of `cectray_core`. Also home of the file-backed
//! settings store.

mod store;

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cectray_core::config::{DEFAULT_POLL_INTERVAL, DEFAULT_SCREENSAVER_DEBOUNCE};
use cectray_core::{ControllerConfig, MonitorConfig};

pub use store::FileSettingsStore;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// OSD name announced on the CEC bus.
    #[serde(default = "default_device_name")]
    pub device_name: String,

    #[serde(default)]
    pub monitor: MonitorSection,

    /// Settings file; defaults to `settings.toml` in the data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_path: Option<PathBuf>,

    /// Applications that receive remote-control keys.
    #[serde(default)]
    pub applications: Vec<ApplicationConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            monitor: MonitorSection::default(),
            settings_path: None,
            applications: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MonitorSection {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_screensaver_debounce_secs")]
    pub screensaver_debounce_secs: u64,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            screensaver_debounce_secs: default_screensaver_debounce_secs(),
        }
    }
}

/// A program driven by remote-control keys.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApplicationConfig {
    pub name: String,

    /// Program and arguments, e.g. `["mpv", "--input-file=/dev/stdin"]`.
    pub command: Vec<String>,

    /// Start the program when this computer becomes the active source.
    #[serde(default)]
    pub auto_start: bool,
}

fn default_device_name() -> String {
    ControllerConfig::default().device_name
}
fn default_poll_interval_ms() -> u64 {
    u64::try_from(DEFAULT_POLL_INTERVAL.as_millis()).unwrap_or(100)
}
fn default_screensaver_debounce_secs() -> u64 {
    DEFAULT_SCREENSAVER_DEBOUNCE.as_secs()
}

impl Config {
    /// Check values the TOML types cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_name.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "device_name".into(),
                reason: "must not be empty".into(),
            });
        }
        // OSD names are at most 14 bytes on the wire.
        if self.device_name.len() > 14 {
            return Err(ConfigError::Validation {
                field: "device_name".into(),
                reason: format!("'{}' is longer than 14 bytes", self.device_name),
            });
        }
        if self.monitor.poll_interval_ms == 0 {
            return Err(ConfigError::Validation {
                field: "monitor.poll_interval_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        let mut names = std::collections::HashSet::new();
        for app in &self.applications {
            if app.command.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("applications.{}.command", app.name),
                    reason: "must name a program".into(),
                });
            }
            if !names.insert(app.name.as_str()) {
                return Err(ConfigError::Validation {
                    field: "applications".into(),
                    reason: format!("duplicate application '{}'", app.name),
                });
            }
        }
        Ok(())
    }

    /// Where persistent settings live.
    pub fn settings_path(&self) -> PathBuf {
        self.settings_path.clone().unwrap_or_else(default_settings_path)
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            device_name: self.device_name.clone(),
            ..ControllerConfig::default()
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            poll_interval: Duration::from_millis(self.monitor.poll_interval_ms),
            screensaver_debounce: Duration::from_secs(self.monitor.screensaver_debounce_secs),
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "cectray", "cectray")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn default_settings_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("settings.toml"),
        |dirs| dirs.data_dir().join("settings.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("cectray");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from the canonical path plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the config from `path` plus environment. A missing file yields the
/// defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CECTRAY_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "could not load config, using defaults");
        Config::default()
    })
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    cfg.validate()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}
