// ── DeviceConfig derivation ──

use cectray_api::{DeviceConfig, LogicalAddress, PhysicalAddress, VendorId};

use super::catalog::SettingKey;
use super::graph::SettingsGraph;

/// Build the adapter configuration the current settings describe.
///
/// Addressing follows the graph's exclusion group: an override (without
/// auto-detect) pins the physical address and clears the HDMI port pair;
/// otherwise the port pair and the auto-detect flag are passed through.
pub fn recompute_device_config(graph: &SettingsGraph, device_name: &str) -> DeviceConfig {
    let detect = graph.flag(SettingKey::DetectPhysicalAddress);
    let overridden = graph.flag(SettingKey::OverridePhysicalAddress) && !detect;

    let (physical_address, base_device, hdmi_port) = if overridden {
        (graph.physical_address(), LogicalAddress::Unknown, 0)
    } else {
        (
            PhysicalAddress::UNSET,
            graph.connected_device(),
            graph.hdmi_port(),
        )
    };

    let tv_vendor = if graph.flag(SettingKey::OverrideTvVendor) {
        graph.tv_vendor()
    } else {
        VendorId::UNKNOWN
    };

    DeviceConfig {
        device_name: device_name.to_owned(),
        device_types: vec![graph.device_type()],
        physical_address,
        base_device,
        hdmi_port,
        autodetect_address: detect,
        tv_vendor,
        wake_devices: graph.addresses(SettingKey::WakeDevices),
        power_off_devices: graph.addresses(SettingKey::PowerOffDevices),
        activate_source: graph.flag(SettingKey::ActivateSource),
        auto_power_on: graph.flag(SettingKey::TvAutoPowerOn),
        adapter: None,
    }
}
