use thiserror::Error;

use crate::types::LogicalAddress;

/// Top-level error type for the `cectray-api` crate.
///
/// Covers every way an adapter call can fail. `cectray-core` maps these
/// into status messages; none of them are fatal to the process.
#[derive(Debug, Error)]
pub enum Error {
    /// The adapter has not been opened (or was closed).
    #[error("CEC adapter is not connected")]
    NotConnected,

    /// Opening the adapter failed (port busy, no adapter found, ...).
    #[error("Could not open the CEC adapter: {reason}")]
    Connect { reason: String },

    /// The adapter accepted the call but reported failure.
    #[error("CEC adapter rejected {command}")]
    Rejected { command: String },

    /// No device answered at the given logical address.
    #[error("No device responded at {address}")]
    NoDevice { address: LogicalAddress },

    /// Anything the native engine reports that has no better mapping.
    #[error("CEC adapter error: {0}")]
    Adapter(String),
}

impl Error {
    /// Returns `true` if this error means the adapter needs to be reopened.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::NotConnected | Self::Connect { .. })
    }
}
