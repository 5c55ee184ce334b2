// ── Setting values ──
//
// Typed values stored in the settings graph, plus the idle-timeout presets.
// Values render to and parse from a short text form; that form is what the
// persistence layer and the CLI exchange.

use std::fmt;
use std::str::FromStr;

use cectray_api::{DeviceType, LogicalAddress, LogicalAddresses, PhysicalAddress, VendorId};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoEnumIterator};

// ── IdleTimeout ──────────────────────────────────────────────────────

/// Preset for "put the TV in standby after the host has been idle for".
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    EnumIter,
    EnumString,
)]
pub enum IdleTimeout {
    #[default]
    #[strum(serialize = "disabled")]
    #[serde(rename = "disabled")]
    Disabled,
    #[strum(serialize = "1m")]
    #[serde(rename = "1m")]
    Min1,
    #[strum(serialize = "2m")]
    #[serde(rename = "2m")]
    Min2,
    #[strum(serialize = "5m")]
    #[serde(rename = "5m")]
    Min5,
    #[strum(serialize = "10m")]
    #[serde(rename = "10m")]
    Min10,
    #[strum(serialize = "15m")]
    #[serde(rename = "15m")]
    Min15,
    #[strum(serialize = "30m")]
    #[serde(rename = "30m")]
    Min30,
    #[strum(serialize = "1h")]
    #[serde(rename = "1h")]
    Hr1,
    #[strum(serialize = "2h")]
    #[serde(rename = "2h")]
    Hr2,
    #[strum(serialize = "3h")]
    #[serde(rename = "3h")]
    Hr3,
    #[strum(serialize = "6h")]
    #[serde(rename = "6h")]
    Hr6,
}

impl IdleTimeout {
    /// Threshold in seconds; `-1` when disabled.
    pub fn seconds(self) -> i64 {
        match self {
            Self::Disabled => -1,
            Self::Min1 => 60,
            Self::Min2 => 2 * 60,
            Self::Min5 => 5 * 60,
            Self::Min10 => 10 * 60,
            Self::Min15 => 15 * 60,
            Self::Min30 => 30 * 60,
            Self::Hr1 => 60 * 60,
            Self::Hr2 => 2 * 60 * 60,
            Self::Hr3 => 3 * 60 * 60,
            Self::Hr6 => 6 * 60 * 60,
        }
    }

    pub fn is_enabled(self) -> bool {
        self.seconds() > 0
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Disabled => "Disabled",
            Self::Min1 => "1 minute",
            Self::Min2 => "2 minutes",
            Self::Min5 => "5 minutes",
            Self::Min10 => "10 minutes",
            Self::Min15 => "15 minutes",
            Self::Min30 => "30 minutes",
            Self::Hr1 => "1 hour",
            Self::Hr2 => "2 hours",
            Self::Hr3 => "3 hours",
            Self::Hr6 => "6 hours",
        }
    }

    /// All presets in ascending order, as offered to the user.
    pub fn presets() -> impl Iterator<Item = IdleTimeout> {
        Self::iter()
    }
}

// ── SettingKind / SettingValue ───────────────────────────────────────

/// Type tag of a [`SettingValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum SettingKind {
    Bool,
    Byte,
    PhysicalAddress,
    LogicalAddress,
    LogicalAddresses,
    DeviceType,
    VendorId,
    IdleTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingValue {
    Bool(bool),
    Byte(u8),
    PhysicalAddress(PhysicalAddress),
    LogicalAddress(LogicalAddress),
    LogicalAddresses(LogicalAddresses),
    DeviceType(DeviceType),
    VendorId(VendorId),
    IdleTimeout(IdleTimeout),
}

impl SettingValue {
    pub fn kind(&self) -> SettingKind {
        match self {
            Self::Bool(_) => SettingKind::Bool,
            Self::Byte(_) => SettingKind::Byte,
            Self::PhysicalAddress(_) => SettingKind::PhysicalAddress,
            Self::LogicalAddress(_) => SettingKind::LogicalAddress,
            Self::LogicalAddresses(_) => SettingKind::LogicalAddresses,
            Self::DeviceType(_) => SettingKind::DeviceType,
            Self::VendorId(_) => SettingKind::VendorId,
            Self::IdleTimeout(_) => SettingKind::IdleTimeout,
        }
    }

    /// Parse the text form of a value of the given kind.
    pub fn parse(kind: SettingKind, text: &str) -> Result<Self, String> {
        let text = text.trim();
        let value = match kind {
            SettingKind::Bool => Self::Bool(parse_bool(text)?),
            SettingKind::Byte => Self::Byte(text.parse().map_err(|e| format!("{e}"))?),
            SettingKind::PhysicalAddress => {
                Self::PhysicalAddress(PhysicalAddress::from_str(text).map_err(|e| e.to_string())?)
            }
            SettingKind::LogicalAddress => Self::LogicalAddress(
                LogicalAddress::from_str(text).map_err(|_| format!("unknown address '{text}'"))?,
            ),
            SettingKind::LogicalAddresses => Self::LogicalAddresses(
                LogicalAddresses::from_str(text)
                    .map_err(|_| format!("invalid address list '{text}'"))?,
            ),
            SettingKind::DeviceType => Self::DeviceType(
                DeviceType::from_str(text).map_err(|_| format!("unknown device type '{text}'"))?,
            ),
            SettingKind::VendorId => Self::VendorId(
                VendorId::from_str(text).map_err(|_| format!("unknown vendor '{text}'"))?,
            ),
            SettingKind::IdleTimeout => {
                Self::IdleTimeout(IdleTimeout::from_str(text).map_err(|_| {
                    let presets: Vec<String> =
                        IdleTimeout::presets().map(|p| p.to_string()).collect();
                    format!("unknown timeout '{text}' (one of {})", presets.join(", "))
                })?)
            }
        };
        Ok(value)
    }
}

fn parse_bool(text: &str) -> Result<bool, String> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(format!("expected true or false, got '{text}'")),
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::PhysicalAddress(v) => write!(f, "{v}"),
            Self::LogicalAddress(v) => write!(f, "{v}"),
            Self::LogicalAddresses(v) => write!(f, "{v}"),
            Self::DeviceType(v) => write!(f, "{v}"),
            Self::VendorId(v) => write!(f, "{v}"),
            Self::IdleTimeout(v) => write!(f, "{v}"),
        }
    }
}
