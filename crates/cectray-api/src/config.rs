// ── Adapter configuration ──
//
// `DeviceConfig` is the snapshot the core pushes into the adapter with
// `connect` / `set_configuration`, and the adapter hands back in
// `AdapterEvent::ConfigurationChanged` when it learns something from the bus.

use serde::{Deserialize, Serialize};

use crate::types::{DeviceType, LogicalAddress, LogicalAddresses, PhysicalAddress, VendorId};

/// Which kind of USB/serial adapter is attached.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AdapterType {
    #[default]
    Unknown,
    PulseEightExternal,
    PulseEightDaughterboard,
    RaspberryPi,
    Simulated,
}

/// Version information reported by the adapter after connecting.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdapterInfo {
    pub adapter_type: AdapterType,
    pub firmware_version: u16,
    /// Seconds since the Unix epoch, 0 when the firmware does not report it.
    pub firmware_build_date: i64,
    /// Version string of the protocol engine.
    pub server_version: String,
}

impl AdapterInfo {
    /// Firmware 9 and newer can power the TV on by itself.
    pub const AUTO_POWER_ON_MIN_FIRMWARE: u16 = 9;

    pub fn supports_auto_power_on(&self) -> bool {
        self.firmware_version >= Self::AUTO_POWER_ON_MIN_FIRMWARE
    }
}

/// How the adapter determines its own physical address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum AddressingMode {
    /// Use a fixed, user-entered physical address.
    Override { address: PhysicalAddress },
    /// Ask the bus (EDID) for the address.
    Autodetect,
    /// Derive the address from the device we are plugged into and its port.
    HdmiPort {
        base_device: LogicalAddress,
        port: u8,
    },
}

/// Full adapter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// OSD name announced on the bus.
    pub device_name: String,
    pub device_types: Vec<DeviceType>,
    /// `PhysicalAddress::UNSET` unless addressing is overridden.
    pub physical_address: PhysicalAddress,
    pub base_device: LogicalAddress,
    pub hdmi_port: u8,
    pub autodetect_address: bool,
    /// `VendorId::UNKNOWN` lets the adapter query the TV.
    pub tv_vendor: VendorId,
    pub wake_devices: LogicalAddresses,
    pub power_off_devices: LogicalAddresses,
    pub activate_source: bool,
    pub auto_power_on: bool,
    #[serde(default)]
    pub adapter: Option<AdapterInfo>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_name: String::from("cectray"),
            device_types: vec![DeviceType::RecordingDevice],
            physical_address: PhysicalAddress::UNSET,
            base_device: LogicalAddress::Tv,
            hdmi_port: 1,
            autodetect_address: true,
            tv_vendor: VendorId::UNKNOWN,
            wake_devices: LogicalAddresses::single(LogicalAddress::Tv),
            power_off_devices: LogicalAddresses::single(LogicalAddress::Tv),
            activate_source: true,
            auto_power_on: true,
            adapter: None,
        }
    }
}

impl DeviceConfig {
    /// The addressing mode these fields describe. Autodetect wins over an
    /// override, an override wins over the HDMI port pair.
    pub fn addressing_mode(&self) -> AddressingMode {
        if self.autodetect_address {
            AddressingMode::Autodetect
        } else if self.physical_address.is_set() {
            AddressingMode::Override {
                address: self.physical_address,
            }
        } else {
            AddressingMode::HdmiPort {
                base_device: self.base_device,
                port: self.hdmi_port,
            }
        }
    }

    /// Primary device type, the first entry of `device_types`.
    pub fn primary_type(&self) -> Option<DeviceType> {
        self.device_types.first().copied()
    }

    /// Merge a configuration reported by the adapter.
    ///
    /// The device name is ours and is kept. Adapter info is only replaced
    /// when the update carries one.
    pub fn update(&mut self, other: &DeviceConfig) {
        self.device_types.clone_from(&other.device_types);
        self.physical_address = other.physical_address;
        self.base_device = other.base_device;
        self.hdmi_port = other.hdmi_port;
        self.autodetect_address = other.autodetect_address;
        self.tv_vendor = other.tv_vendor;
        self.wake_devices = other.wake_devices;
        self.power_off_devices = other.power_off_devices;
        self.activate_source = other.activate_source;
        self.auto_power_on = other.auto_power_on;
        if other.adapter.is_some() {
            self.adapter.clone_from(&other.adapter);
        }
    }
}
