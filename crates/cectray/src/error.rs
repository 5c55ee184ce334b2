//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use cectray_config::ConfigError;
use cectray_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Device ───────────────────────────────────────────────────────
    #[error("Could not talk to the CEC adapter: {reason}")]
    #[diagnostic(
        code(cectray::adapter),
        help("Check that the adapter is plugged in and not used by another program.")
    )]
    Adapter { reason: String },

    // ── Settings ─────────────────────────────────────────────────────
    #[error("Unknown setting '{name}'")]
    #[diagnostic(
        code(cectray::unknown_setting),
        help("Run: cectray settings list --all")
    )]
    UnknownSetting { name: String },

    #[error("Setting '{key}' is read from the adapter and cannot be stored")]
    #[diagnostic(code(cectray::device_setting))]
    DeviceSourced { key: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(cectray::validation))]
    Validation { field: String, reason: String },

    #[error("Could not save settings: {message}")]
    #[diagnostic(code(cectray::persistence))]
    Persistence { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file already exists")]
    #[diagnostic(
        code(cectray::config_exists),
        help("Use --force to overwrite {path}")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(cectray::config))]
    Config(#[from] ConfigError),

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Adapter { .. } => exit_code::CONNECTION,
            Self::UnknownSetting { .. } => exit_code::NOT_FOUND,
            Self::ConfigExists { .. } => exit_code::CONFLICT,
            Self::Validation { .. }
            | Self::DeviceSourced { .. }
            | Self::Config(ConfigError::Validation { .. }) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { key, message } => CliError::Validation {
                field: key.to_string(),
                reason: message,
            },
            CoreError::UnknownSetting { name } => CliError::UnknownSetting { name },
            CoreError::Persistence { message } => CliError::Persistence { message },
            CoreError::NotConnected => CliError::Adapter {
                reason: "not connected".into(),
            },
            CoreError::DeviceCommand { command, reason } => CliError::Adapter {
                reason: format!("{command}: {reason}"),
            },
            CoreError::InvalidTarget { command, address } => CliError::Validation {
                field: "target".into(),
                reason: format!("{command} cannot target {address}"),
            },
            CoreError::DuplicateApplication { name } => CliError::Validation {
                field: "applications".into(),
                reason: format!("duplicate application '{name}'"),
            },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}
