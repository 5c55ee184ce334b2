// cectray-api: contract between the orchestration core and an HDMI-CEC adapter
//
// The native protocol engine (frame encoding, bus polling, USB transport) is
// not implemented here. This crate only describes what the core can ask of an
// adapter ([`CecAdapter`]) and what the adapter reports back ([`AdapterEvent`]).

pub mod adapter;
pub mod config;
pub mod error;
pub mod simulated;
pub mod types;

pub use adapter::{AdapterEvent, CecAdapter, EventSink};
pub use config::{AdapterInfo, AdapterType, AddressingMode, DeviceConfig};
pub use error::Error;
pub use simulated::{AdapterCall, SimulatedAdapter, SimulatedDevice};
pub use types::{
    Alert, BusCommand, DeviceInfo, DeviceType, KeyCode, Keypress, LogLevel, LogMessage,
    LogicalAddress, LogicalAddresses, Opcode, PhysicalAddress, PowerStatus, VendorId,
};
