// ── Simulated bus adapter ──
//
// In-process stand-in for the protocol engine. Keeps a small table of bus
// devices, answers queries from it, and records every call so callers can
// assert on the exact command sequence. Used by the test suites and by the
// daemon when no hardware engine is linked.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::adapter::{AdapterEvent, CecAdapter, EventSink};
use crate::config::{AdapterInfo, AdapterType, AddressingMode, DeviceConfig};
use crate::error::Error;
use crate::types::{
    BusCommand, DeviceInfo, LogicalAddress, LogicalAddresses, PhysicalAddress, PowerStatus,
    VendorId,
};

/// Physical address reported in autodetect mode.
const AUTODETECTED_ADDRESS: PhysicalAddress = PhysicalAddress(0x1000);

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterCall {
    Connect(DeviceConfig),
    Close,
    EnableCallbacks,
    DisableCallbacks,
    SetConfiguration(DeviceConfig),
    ActiveDevices,
    StandbyDevices(LogicalAddress),
    PowerOnDevices(LogicalAddress),
    SetActiveSource,
    SetPhysicalAddress(PhysicalAddress),
    SendCommand(BusCommand),
    DeviceVendorId(LogicalAddress),
    DeviceInfo(LogicalAddress),
    RescanDevices,
}

/// A device present on the simulated bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedDevice {
    pub address: LogicalAddress,
    pub vendor: VendorId,
    pub physical_address: PhysicalAddress,
    pub power_status: PowerStatus,
    pub osd_name: String,
}

impl SimulatedDevice {
    /// A powered-on TV at the root of the HDMI tree.
    pub fn tv(vendor: VendorId) -> Self {
        Self {
            address: LogicalAddress::Tv,
            vendor,
            physical_address: PhysicalAddress::ROOT,
            power_status: PowerStatus::On,
            osd_name: String::from("TV"),
        }
    }

    pub fn audio_system(physical_address: PhysicalAddress) -> Self {
        Self {
            address: LogicalAddress::AudioSystem,
            vendor: VendorId::UNKNOWN,
            physical_address,
            power_status: PowerStatus::On,
            osd_name: String::from("Audio"),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    connected: bool,
    sink: Option<EventSink>,
    config: Option<DeviceConfig>,
    devices: BTreeMap<LogicalAddress, SimulatedDevice>,
    calls: Vec<AdapterCall>,
    announce_on_connect: bool,
    fail_connect: bool,
    fail_set_configuration: bool,
    firmware_version: u16,
}

/// In-memory [`CecAdapter`].
#[derive(Debug)]
pub struct SimulatedAdapter {
    state: Mutex<State>,
}

impl Default for SimulatedAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedAdapter {
    /// Empty bus, firmware version 9.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                firmware_version: AdapterInfo::AUTO_POWER_ON_MIN_FIRMWARE,
                ..State::default()
            }),
        }
    }

    /// Add a device to the bus (builder style).
    pub fn with_device(self, device: SimulatedDevice) -> Self {
        self.add_device(device);
        self
    }

    /// Report a `ConfigurationChanged` right after a successful connect, the
    /// way a real engine does once it has read the EDID.
    pub fn announcing_configuration(self) -> Self {
        self.lock().announce_on_connect = true;
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_device(&self, device: SimulatedDevice) {
        self.lock().devices.insert(device.address, device);
    }

    pub fn remove_device(&self, address: LogicalAddress) {
        self.lock().devices.remove(&address);
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.lock().fail_connect = fail;
    }

    pub fn set_fail_set_configuration(&self, fail: bool) {
        self.lock().fail_set_configuration = fail;
    }

    pub fn set_firmware_version(&self, version: u16) {
        self.lock().firmware_version = version;
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    pub fn callbacks_enabled(&self) -> bool {
        self.lock().sink.is_some()
    }

    /// Power status of a simulated device, if present.
    pub fn power_status(&self, address: LogicalAddress) -> Option<PowerStatus> {
        self.lock().devices.get(&address).map(|d| d.power_status)
    }

    /// Last configuration pushed with `connect` or `set_configuration`.
    pub fn current_config(&self) -> Option<DeviceConfig> {
        self.lock().config.clone()
    }

    /// Snapshot of every call recorded so far.
    pub fn calls(&self) -> Vec<AdapterCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Number of recorded calls matching `pred`.
    pub fn call_count(&self, pred: impl Fn(&AdapterCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }

    /// Deliver an event as if it came from the bus.
    ///
    /// Returns `false` when callbacks are disabled or the receiver is gone.
    pub fn inject(&self, event: AdapterEvent) -> bool {
        let sink = self.lock().sink.clone();
        match sink {
            Some(sink) => sink.send(event).is_ok(),
            None => {
                debug!(?event, "callbacks disabled, dropping simulated event");
                false
            }
        }
    }

    fn record(state: &mut State, call: AdapterCall) {
        debug!(?call, "simulated adapter call");
        state.calls.push(call);
    }

    fn adapter_info(state: &State) -> AdapterInfo {
        AdapterInfo {
            adapter_type: AdapterType::Simulated,
            firmware_version: state.firmware_version,
            firmware_build_date: 0,
            server_version: format!("cectray-simulated {}", env!("CARGO_PKG_VERSION")),
        }
    }

    fn resolve_physical_address(state: &State) -> PhysicalAddress {
        let Some(config) = state.config.as_ref() else {
            return PhysicalAddress::UNSET;
        };
        match config.addressing_mode() {
            AddressingMode::Autodetect => AUTODETECTED_ADDRESS,
            AddressingMode::Override { address } => address,
            AddressingMode::HdmiPort { base_device, port } => state
                .devices
                .get(&base_device)
                .map_or(PhysicalAddress::ROOT, |d| d.physical_address)
                .child(port)
                .unwrap_or(PhysicalAddress::UNSET),
        }
    }

    fn require_connected(state: &State) -> Result<(), Error> {
        if state.connected {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    fn set_power(state: &mut State, address: LogicalAddress, status: PowerStatus) {
        for device in state.devices.values_mut() {
            if address == LogicalAddress::Broadcast || device.address == address {
                device.power_status = status;
            }
        }
    }
}

impl CecAdapter for SimulatedAdapter {
    fn connect(&self, config: &DeviceConfig) -> Result<(), Error> {
        let mut state = self.lock();
        Self::record(&mut state, AdapterCall::Connect(config.clone()));
        if state.fail_connect {
            return Err(Error::Connect {
                reason: String::from("no adapter found"),
            });
        }
        state.connected = true;
        state.config = Some(config.clone());

        if state.announce_on_connect {
            let mut reported = config.clone();
            reported.physical_address = Self::resolve_physical_address(&state);
            reported.adapter = Some(Self::adapter_info(&state));
            if let Some(sink) = state.sink.as_ref() {
                if sink
                    .send(AdapterEvent::ConfigurationChanged(reported))
                    .is_err()
                {
                    debug!("configuration announcement dropped, receiver gone");
                }
            }
        }
        Ok(())
    }

    fn close(&self) {
        let mut state = self.lock();
        Self::record(&mut state, AdapterCall::Close);
        state.connected = false;
    }

    fn enable_callbacks(&self, sink: EventSink) {
        let mut state = self.lock();
        Self::record(&mut state, AdapterCall::EnableCallbacks);
        state.sink = Some(sink);
    }

    fn disable_callbacks(&self) {
        let mut state = self.lock();
        Self::record(&mut state, AdapterCall::DisableCallbacks);
        state.sink = None;
    }

    fn set_configuration(&self, config: &DeviceConfig) -> Result<(), Error> {
        let mut state = self.lock();
        Self::record(&mut state, AdapterCall::SetConfiguration(config.clone()));
        Self::require_connected(&state)?;
        if state.fail_set_configuration {
            return Err(Error::Rejected {
                command: String::from("set configuration"),
            });
        }
        state.config = Some(config.clone());
        Ok(())
    }

    fn active_devices(&self) -> Result<LogicalAddresses, Error> {
        let mut state = self.lock();
        Self::record(&mut state, AdapterCall::ActiveDevices);
        Self::require_connected(&state)?;
        Ok(state.devices.keys().copied().collect())
    }

    fn standby_devices(&self, address: LogicalAddress) -> Result<(), Error> {
        let mut state = self.lock();
        Self::record(&mut state, AdapterCall::StandbyDevices(address));
        Self::require_connected(&state)?;
        Self::set_power(&mut state, address, PowerStatus::Standby);
        Ok(())
    }

    fn power_on_devices(&self, address: LogicalAddress) -> Result<(), Error> {
        let mut state = self.lock();
        Self::record(&mut state, AdapterCall::PowerOnDevices(address));
        Self::require_connected(&state)?;
        Self::set_power(&mut state, address, PowerStatus::On);
        Ok(())
    }

    fn set_active_source(&self) -> Result<(), Error> {
        let mut state = self.lock();
        Self::record(&mut state, AdapterCall::SetActiveSource);
        Self::require_connected(&state)?;
        let wake = state
            .config
            .as_ref()
            .map(|c| c.wake_devices)
            .unwrap_or_default();
        for address in wake.iter() {
            Self::set_power(&mut state, address, PowerStatus::On);
        }
        Ok(())
    }

    fn set_physical_address(&self, address: PhysicalAddress) -> Result<(), Error> {
        let mut state = self.lock();
        Self::record(&mut state, AdapterCall::SetPhysicalAddress(address));
        Self::require_connected(&state)?;
        if let Some(config) = state.config.as_mut() {
            config.physical_address = address;
            config.autodetect_address = false;
        }
        Ok(())
    }

    fn send_command(&self, command: &BusCommand) -> Result<(), Error> {
        let mut state = self.lock();
        Self::record(&mut state, AdapterCall::SendCommand(command.clone()));
        Self::require_connected(&state)?;
        if command.destination != LogicalAddress::Broadcast
            && !state.devices.contains_key(&command.destination)
        {
            return Err(Error::NoDevice {
                address: command.destination,
            });
        }
        Ok(())
    }

    fn logical_addresses(&self) -> LogicalAddresses {
        let state = self.lock();
        if !state.connected {
            return LogicalAddresses::EMPTY;
        }
        state
            .config
            .as_ref()
            .map(|c| c.device_types.iter().map(|t| t.primary_address()).collect())
            .unwrap_or_default()
    }

    fn device_vendor_id(&self, address: LogicalAddress) -> Result<VendorId, Error> {
        let mut state = self.lock();
        Self::record(&mut state, AdapterCall::DeviceVendorId(address));
        Self::require_connected(&state)?;
        state
            .devices
            .get(&address)
            .map(|d| d.vendor)
            .ok_or(Error::NoDevice { address })
    }

    fn device_info(&self, address: LogicalAddress) -> Result<DeviceInfo, Error> {
        let mut state = self.lock();
        Self::record(&mut state, AdapterCall::DeviceInfo(address));
        Self::require_connected(&state)?;
        state
            .devices
            .get(&address)
            .map(|d| DeviceInfo {
                address: d.address,
                vendor: d.vendor,
                physical_address: d.physical_address,
                power_status: d.power_status,
                osd_name: d.osd_name.clone(),
            })
            .ok_or(Error::NoDevice { address })
    }

    fn physical_address(&self) -> Result<PhysicalAddress, Error> {
        let state = self.lock();
        Self::require_connected(&state)?;
        Ok(Self::resolve_physical_address(&state))
    }

    fn rescan_devices(&self) -> Result<(), Error> {
        let mut state = self.lock();
        Self::record(&mut state, AdapterCall::RescanDevices);
        Self::require_connected(&state)
    }

    fn lib_info(&self) -> Option<AdapterInfo> {
        let state = self.lock();
        state.connected.then(|| Self::adapter_info(&state))
    }
}
