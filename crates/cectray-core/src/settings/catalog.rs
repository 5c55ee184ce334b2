// ── Setting catalog ──
//
// Stable keys, defaults, bounds and enable rules for every setting the
// tray exposes. Keys are the names used in the persisted settings file.

use cectray_api::{DeviceType, LogicalAddress, LogicalAddresses, PhysicalAddress, VendorId};
use strum::{AsRefStr, EnumIter, EnumString};

use super::graph::SettingsGraph;
use super::value::{IdleTimeout, SettingValue};

/// Identifier of a setting.
///
/// Parses from either the persisted name (`global_hdmi_port`) or the short
/// name (`hdmi-port`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display, AsRefStr, EnumIter,
    EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum SettingKey {
    #[strum(to_string = "global_hdmi_port", serialize = "hdmi-port")]
    HdmiPort,
    #[strum(
        to_string = "global_connected_to_hdmi_device",
        serialize = "connected-device"
    )]
    ConnectedDevice,
    #[strum(to_string = "global_activate_source", serialize = "activate-source")]
    ActivateSource,
    #[strum(to_string = "global_advanced_mode", serialize = "advanced-mode")]
    AdvancedMode,
    #[strum(to_string = "global_physical_address", serialize = "physical-address")]
    PhysicalAddress,
    #[strum(
        to_string = "global_override_physical_address",
        serialize = "override-physical-address"
    )]
    OverridePhysicalAddress,
    #[strum(to_string = "global_device_type", serialize = "device-type")]
    DeviceType,
    #[strum(to_string = "global_tv_vendor", serialize = "tv-vendor")]
    TvVendor,
    #[strum(to_string = "global_override_tv_vendor", serialize = "override-tv-vendor")]
    OverrideTvVendor,
    #[strum(to_string = "global_wake_devices", serialize = "wake-devices")]
    WakeDevices,
    #[strum(to_string = "global_standby_devices", serialize = "power-off-devices")]
    PowerOffDevices,
    #[strum(to_string = "global_start_hidden", serialize = "start-hidden")]
    StartHidden,
    #[strum(to_string = "global_stop_tv_standby", serialize = "stop-tv-standby")]
    StopTvStandby,
    #[strum(to_string = "global_standby_screen", serialize = "standby-screen")]
    StandbyScreen,
    #[strum(to_string = "global_tv_auto_power_on", serialize = "tv-auto-power-on")]
    TvAutoPowerOn,
    #[strum(
        to_string = "global_detect_physical_address",
        serialize = "detect-physical-address"
    )]
    DetectPhysicalAddress,
}

/// Value constraints beyond the type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bounds {
    Unbounded,
    Range { min: u8, max: u8 },
    Addresses(LogicalAddresses),
    DeviceTypes(Vec<DeviceType>),
}

impl Bounds {
    /// `None` when `value` is acceptable, otherwise the reason it is not.
    pub fn check(&self, value: &SettingValue) -> Option<String> {
        match (self, value) {
            (Self::Range { min, max }, SettingValue::Byte(v)) if v < min || v > max => {
                Some(format!("{v} is outside {min}..={max}"))
            }
            (Self::Addresses(allowed), SettingValue::LogicalAddress(a))
                if !allowed.contains(*a) =>
            {
                Some(format!("{a} is not one of {allowed}"))
            }
            (Self::DeviceTypes(allowed), SettingValue::DeviceType(t)) if !allowed.contains(t) => {
                let names: Vec<String> = allowed.iter().map(ToString::to_string).collect();
                Some(format!("{t} is not one of {}", names.join(", ")))
            }
            _ => None,
        }
    }
}

/// Enable rule: pure function of the other settings.
pub type EnableRule = fn(&SettingsGraph) -> bool;

/// Static description of one setting.
#[derive(Debug, Clone)]
pub struct SettingSpec {
    pub key: SettingKey,
    pub label: &'static str,
    pub default: SettingValue,
    pub bounds: Bounds,
    pub base_enabled: bool,
    pub rule: Option<EnableRule>,
    /// `false` for values that are read back from the adapter on connect.
    pub persistent: bool,
}

// ── Enable rules ─────────────────────────────────────────────────────

fn hdmi_port_rule(graph: &SettingsGraph) -> bool {
    !graph.flag(SettingKey::OverridePhysicalAddress) && !graph.flag(SettingKey::DetectPhysicalAddress)
}

fn physical_address_rule(graph: &SettingsGraph) -> bool {
    graph.flag(SettingKey::OverridePhysicalAddress) && !graph.flag(SettingKey::DetectPhysicalAddress)
}

fn detect_address_rule(graph: &SettingsGraph) -> bool {
    !graph.flag(SettingKey::OverridePhysicalAddress)
}

fn tv_vendor_rule(graph: &SettingsGraph) -> bool {
    graph.flag(SettingKey::OverrideTvVendor)
}

// ── Catalog ──────────────────────────────────────────────────────────

fn spec(key: SettingKey, label: &'static str, default: SettingValue) -> SettingSpec {
    SettingSpec {
        key,
        label,
        default,
        bounds: Bounds::Unbounded,
        base_enabled: true,
        rule: None,
        persistent: true,
    }
}

impl SettingSpec {
    fn bounded(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    fn disabled(mut self) -> Self {
        self.base_enabled = false;
        self
    }

    fn rule(mut self, rule: EnableRule) -> Self {
        self.rule = Some(rule);
        self
    }

    fn from_device(mut self) -> Self {
        self.persistent = false;
        self
    }
}

/// Every setting with its default, in display order.
pub fn catalog() -> Vec<SettingSpec> {
    let tv_or_audio: LogicalAddresses = [LogicalAddress::Tv, LogicalAddress::AudioSystem]
        .into_iter()
        .collect();
    let tv_only = LogicalAddresses::single(LogicalAddress::Tv);

    vec![
        spec(SettingKey::HdmiPort, "HDMI port", SettingValue::Byte(1))
            .bounded(Bounds::Range { min: 1, max: 15 })
            .rule(hdmi_port_rule),
        spec(
            SettingKey::ConnectedDevice,
            "Connected to HDMI device",
            SettingValue::LogicalAddress(LogicalAddress::Tv),
        )
        .bounded(Bounds::Addresses(tv_or_audio))
        .rule(hdmi_port_rule),
        spec(
            SettingKey::ActivateSource,
            "Make the computer the active source when starting",
            SettingValue::Bool(true),
        )
        .disabled(),
        spec(
            SettingKey::AdvancedMode,
            "Advanced mode",
            SettingValue::Bool(false),
        )
        .disabled(),
        spec(
            SettingKey::PhysicalAddress,
            "Physical address",
            SettingValue::PhysicalAddress(PhysicalAddress::UNSET),
        )
        .disabled()
        .rule(physical_address_rule)
        .from_device(),
        spec(
            SettingKey::OverridePhysicalAddress,
            "Override the physical address",
            SettingValue::Bool(false),
        ),
        spec(
            SettingKey::DeviceType,
            "Device type",
            SettingValue::DeviceType(DeviceType::RecordingDevice),
        )
        .bounded(Bounds::DeviceTypes(vec![
            DeviceType::RecordingDevice,
            DeviceType::PlaybackDevice,
        ]))
        .disabled()
        .from_device(),
        spec(
            SettingKey::TvVendor,
            "TV vendor",
            SettingValue::VendorId(VendorId::UNKNOWN),
        )
        .disabled()
        .rule(tv_vendor_rule),
        spec(
            SettingKey::OverrideTvVendor,
            "Override the TV vendor",
            SettingValue::Bool(false),
        )
        .disabled(),
        spec(
            SettingKey::WakeDevices,
            "Wake devices",
            SettingValue::LogicalAddresses(tv_only),
        )
        .disabled(),
        spec(
            SettingKey::PowerOffDevices,
            "Power off devices",
            SettingValue::LogicalAddresses(tv_only),
        )
        .disabled(),
        spec(
            SettingKey::StartHidden,
            "Start hidden",
            SettingValue::Bool(false),
        ),
        spec(
            SettingKey::StopTvStandby,
            "Suspend the computer when the TV goes to standby",
            SettingValue::Bool(true),
        ),
        spec(
            SettingKey::StandbyScreen,
            "Put devices in standby when idle for",
            SettingValue::IdleTimeout(IdleTimeout::Disabled),
        ),
        spec(
            SettingKey::TvAutoPowerOn,
            "Power on the TV when the computer starts",
            SettingValue::Bool(true),
        )
        .from_device(),
        spec(
            SettingKey::DetectPhysicalAddress,
            "Detect the physical address",
            SettingValue::Bool(true),
        )
        .rule(detect_address_rule)
        .from_device(),
    ]
}
