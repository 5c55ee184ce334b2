// ── Core error types ──
//
// Errors surfaced by the orchestration core. None of them are fatal: the
// controller turns device failures into status text and keeps running.
// The `From<cectray_api::Error>` impl maps adapter failures onto
// domain-level variants.

use thiserror::Error;

use cectray_api::LogicalAddress;

use crate::settings::SettingKey;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Settings ─────────────────────────────────────────────────────
    #[error("Invalid value for {key}: {message}")]
    Validation { key: SettingKey, message: String },

    #[error("Unknown setting: {name}")]
    UnknownSetting { name: String },

    #[error("Could not persist settings: {message}")]
    Persistence { message: String },

    // ── Device ───────────────────────────────────────────────────────
    #[error("CEC adapter is not connected")]
    NotConnected,

    #[error("{command} failed: {reason}")]
    DeviceCommand { command: String, reason: String },

    #[error("{command} cannot target {address}")]
    InvalidTarget {
        command: String,
        address: LogicalAddress,
    },

    // ── Applications ─────────────────────────────────────────────────
    #[error("An application named '{name}' is already registered")]
    DuplicateApplication { name: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Wrap an adapter failure with the name of the command that caused it.
    pub fn device(command: impl Into<String>, err: &cectray_api::Error) -> Self {
        if matches!(err, cectray_api::Error::NotConnected) {
            return CoreError::NotConnected;
        }
        CoreError::DeviceCommand {
            command: command.into(),
            reason: err.to_string(),
        }
    }
}

// ── Conversion from adapter errors ───────────────────────────────────

impl From<cectray_api::Error> for CoreError {
    fn from(err: cectray_api::Error) -> Self {
        match err {
            cectray_api::Error::NotConnected => CoreError::NotConnected,
            cectray_api::Error::Connect { reason } => CoreError::DeviceCommand {
                command: "connect".into(),
                reason,
            },
            cectray_api::Error::Rejected { command } => CoreError::DeviceCommand {
                command,
                reason: "rejected by the adapter".into(),
            },
            cectray_api::Error::NoDevice { address } => CoreError::DeviceCommand {
                command: "query".into(),
                reason: format!("no device at {address}"),
            },
            cectray_api::Error::Adapter(message) => CoreError::DeviceCommand {
                command: "adapter".into(),
                reason: message,
            },
        }
    }
}
