// ── Adapter contract ──
//
// Everything the orchestration core may ask of the protocol engine. Calls are
// synchronous and expected to return quickly; asynchronous notifications are
// pushed as `AdapterEvent` values into the sink registered with
// `enable_callbacks`. Implementations may call the sink from any thread.

use tokio::sync::mpsc;

use crate::config::{AdapterInfo, DeviceConfig};
use crate::error::Error;
use crate::types::{
    Alert, BusCommand, DeviceInfo, Keypress, LogMessage, LogicalAddress, LogicalAddresses,
    PhysicalAddress, VendorId,
};

/// Channel the adapter delivers callbacks into.
///
/// Unbounded so a callback thread never blocks on the orchestration task.
pub type EventSink = mpsc::UnboundedSender<AdapterEvent>;

/// Asynchronous notification from the adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    /// The adapter's effective configuration changed (after connect, or when
    /// the bus reports a new physical address).
    ConfigurationChanged(DeviceConfig),
    Alert { kind: Alert, data: i32 },
    Keypress(Keypress),
    LogMessage(LogMessage),
    /// One of our logical addresses became (or stopped being) the active
    /// source.
    SourceActivated {
        address: LogicalAddress,
        activated: bool,
    },
    /// A command addressed to us (or broadcast) arrived on the bus.
    CommandReceived(BusCommand),
}

/// Operations exposed by an HDMI-CEC adapter.
pub trait CecAdapter: Send + Sync {
    /// Open the adapter with an initial configuration.
    fn connect(&self, config: &DeviceConfig) -> Result<(), Error>;

    /// Close the adapter. Closing a closed adapter is not an error.
    fn close(&self);

    /// Start delivering callbacks into `sink`, replacing any previous sink.
    fn enable_callbacks(&self, sink: EventSink);

    /// Stop delivering callbacks. Events raised meanwhile are dropped.
    fn disable_callbacks(&self);

    fn set_configuration(&self, config: &DeviceConfig) -> Result<(), Error>;

    /// Logical addresses of every device currently present on the bus.
    fn active_devices(&self) -> Result<LogicalAddresses, Error>;

    fn standby_devices(&self, address: LogicalAddress) -> Result<(), Error>;

    fn power_on_devices(&self, address: LogicalAddress) -> Result<(), Error>;

    /// Mark our primary address as the active source.
    fn set_active_source(&self) -> Result<(), Error>;

    fn set_physical_address(&self, address: PhysicalAddress) -> Result<(), Error>;

    fn send_command(&self, command: &BusCommand) -> Result<(), Error>;

    /// The logical addresses the adapter claimed for us.
    fn logical_addresses(&self) -> LogicalAddresses;

    fn device_vendor_id(&self, address: LogicalAddress) -> Result<VendorId, Error>;

    fn device_info(&self, address: LogicalAddress) -> Result<DeviceInfo, Error>;

    /// Our own physical address as currently in effect.
    fn physical_address(&self) -> Result<PhysicalAddress, Error>;

    fn rescan_devices(&self) -> Result<(), Error>;

    /// Engine version and adapter details, once connected.
    fn lib_info(&self) -> Option<AdapterInfo>;
}
