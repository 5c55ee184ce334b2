// ── Bus domain types ──
//
// Addresses, device types, vendors, keys and alerts as the control bus
// describes them. Values are plain `Copy` data so they can cross the
// adapter/core boundary and the orchestration channels freely.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, FromRepr};

// ── LogicalAddress ──────────────────────────────────────────────────

/// Logical address of a device on the bus.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    EnumIter,
    EnumString,
    FromRepr,
)]
#[repr(u8)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum LogicalAddress {
    Tv = 0,
    RecordingDevice1 = 1,
    RecordingDevice2 = 2,
    Tuner1 = 3,
    PlaybackDevice1 = 4,
    AudioSystem = 5,
    Tuner2 = 6,
    Tuner3 = 7,
    PlaybackDevice2 = 8,
    RecordingDevice3 = 9,
    Tuner4 = 10,
    PlaybackDevice3 = 11,
    Reserved1 = 12,
    Reserved2 = 13,
    FreeUse = 14,
    Broadcast = 15,
    Unknown = 0xFF,
}

impl LogicalAddress {
    /// Bus index (0..=15), or `None` for [`Unknown`](Self::Unknown).
    pub fn index(self) -> Option<u8> {
        match self {
            Self::Unknown => None,
            other => Some(other as u8),
        }
    }
}

// ── LogicalAddresses ────────────────────────────────────────────────

/// A set of logical addresses, stored as a 16-bit mask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "Vec<LogicalAddress>", from = "Vec<LogicalAddress>")]
pub struct LogicalAddresses(u16);

impl LogicalAddresses {
    pub const EMPTY: Self = Self(0);

    pub fn single(address: LogicalAddress) -> Self {
        let mut set = Self::EMPTY;
        set.insert(address);
        set
    }

    /// Add an address. [`LogicalAddress::Unknown`] is ignored.
    pub fn insert(&mut self, address: LogicalAddress) {
        if let Some(idx) = address.index() {
            self.0 |= 1u16 << idx;
        }
    }

    pub fn remove(&mut self, address: LogicalAddress) {
        if let Some(idx) = address.index() {
            self.0 &= !(1u16 << idx);
        }
    }

    pub fn contains(&self, address: LogicalAddress) -> bool {
        address.index().is_some_and(|idx| self.0 & (1u16 << idx) != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    /// Iterate in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = LogicalAddress> + use<> {
        let bits = self.0;
        (0u8..16)
            .filter(move |idx| bits & (1u16 << *idx) != 0)
            .filter_map(LogicalAddress::from_repr)
    }
}

impl FromIterator<LogicalAddress> for LogicalAddresses {
    fn from_iter<I: IntoIterator<Item = LogicalAddress>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for address in iter {
            set.insert(address);
        }
        set
    }
}

impl From<Vec<LogicalAddress>> for LogicalAddresses {
    fn from(list: Vec<LogicalAddress>) -> Self {
        list.into_iter().collect()
    }
}

impl From<LogicalAddresses> for Vec<LogicalAddress> {
    fn from(set: LogicalAddresses) -> Self {
        set.iter().collect()
    }
}

impl fmt::Display for LogicalAddresses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|a| a.to_string()).collect();
        write!(f, "{}", names.join(","))
    }
}

impl FromStr for LogicalAddresses {
    type Err = strum::ParseError;

    /// Parses a comma separated list of address names (`tv,audio-system`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(LogicalAddress::from_str)
            .collect()
    }
}

// ── PhysicalAddress ─────────────────────────────────────────────────

/// Topological HDMI address, four nibbles (`1.0.0.0` is TV input 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhysicalAddress(pub u16);

impl PhysicalAddress {
    /// Sentinel meaning "not set / let the adapter decide".
    pub const UNSET: Self = Self(0xFFFF);
    /// The TV itself.
    pub const ROOT: Self = Self(0x0000);

    pub fn is_set(&self) -> bool {
        *self != Self::UNSET
    }

    /// Address of `port` (1..=15) on the device at `self`.
    ///
    /// Returns `None` when `self` is already four levels deep or the port is
    /// out of range.
    pub fn child(&self, port: u8) -> Option<Self> {
        if port == 0 || port > 15 || !self.is_set() {
            return None;
        }
        let depth = (0..4).find(|level| (self.0 >> (12 - level * 4)) & 0xF == 0)?;
        Some(Self(self.0 | (u16::from(port) << (12 - depth * 4))))
    }
}

impl Default for PhysicalAddress {
    fn default() -> Self {
        Self::UNSET
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:X}.{:X}.{:X}.{:X}",
            (self.0 >> 12) & 0xF,
            (self.0 >> 8) & 0xF,
            (self.0 >> 4) & 0xF,
            self.0 & 0xF
        )
    }
}

/// Error returned when a physical address string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid physical address '{0}' (expected e.g. 1.0.0.0 or 1000)")]
pub struct ParsePhysicalAddressError(pub String);

impl FromStr for PhysicalAddress {
    type Err = ParsePhysicalAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePhysicalAddressError(s.to_owned());
        let trimmed = s.trim();
        if trimmed.contains('.') {
            let nibbles: Vec<&str> = trimmed.split('.').collect();
            if nibbles.len() != 4 {
                return Err(err());
            }
            let mut value = 0u16;
            for nibble in nibbles {
                let n = u16::from_str_radix(nibble, 16).map_err(|_| err())?;
                if n > 0xF {
                    return Err(err());
                }
                value = (value << 4) | n;
            }
            Ok(Self(value))
        } else {
            let hex = trimmed.trim_start_matches("0x");
            if hex.is_empty() || hex.len() > 4 {
                return Err(err());
            }
            u16::from_str_radix(hex, 16).map(Self).map_err(|_| err())
        }
    }
}

// ── DeviceType ──────────────────────────────────────────────────────

/// Device type the adapter registers as on the bus.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    EnumIter,
    EnumString,
    FromRepr,
)]
#[repr(u8)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum DeviceType {
    Tv = 0,
    RecordingDevice = 1,
    Reserved = 2,
    Tuner = 3,
    PlaybackDevice = 4,
    AudioSystem = 5,
}

impl DeviceType {
    /// First logical address a device of this type claims.
    pub fn primary_address(self) -> LogicalAddress {
        match self {
            Self::Tv => LogicalAddress::Tv,
            Self::RecordingDevice => LogicalAddress::RecordingDevice1,
            Self::Tuner => LogicalAddress::Tuner1,
            Self::PlaybackDevice => LogicalAddress::PlaybackDevice1,
            Self::AudioSystem => LogicalAddress::AudioSystem,
            Self::Reserved => LogicalAddress::FreeUse,
        }
    }
}

// ── VendorId ────────────────────────────────────────────────────────

/// IEEE OUI reported by a device's vendor-id message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VendorId(pub u32);

impl VendorId {
    pub const UNKNOWN: Self = Self(0);
    pub const TOSHIBA: Self = Self(0x00_0039);
    pub const SAMSUNG: Self = Self(0x00_00F0);
    pub const PANASONIC: Self = Self(0x00_8045);
    pub const PHILIPS: Self = Self(0x00_903E);
    pub const LG: Self = Self(0x00_E091);
    pub const SONY: Self = Self(0x08_0046);
    pub const PULSE_EIGHT: Self = Self(0x00_1582);

    const NAMED: [(Self, &'static str); 7] = [
        (Self::TOSHIBA, "toshiba"),
        (Self::SAMSUNG, "samsung"),
        (Self::PANASONIC, "panasonic"),
        (Self::PHILIPS, "philips"),
        (Self::LG, "lg"),
        (Self::SONY, "sony"),
        (Self::PULSE_EIGHT, "pulse-eight"),
    ];

    pub fn is_known(&self) -> bool {
        *self != Self::UNKNOWN
    }

    pub fn name(&self) -> Option<&'static str> {
        Self::NAMED
            .iter()
            .find(|(id, _)| id == self)
            .map(|(_, name)| *name)
    }
}

impl fmt::Display for VendorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.is_known(), self.name()) {
            (false, _) => write!(f, "unknown"),
            (true, Some(name)) => write!(f, "{name}"),
            (true, None) => write!(f, "0x{:06X}", self.0),
        }
    }
}

impl FromStr for VendorId {
    type Err = std::num::ParseIntError;

    /// Accepts a vendor name (`samsung`), `unknown`, or a hex OUI (`0x00E091`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        if lower == "unknown" {
            return Ok(Self::UNKNOWN);
        }
        if let Some((id, _)) = Self::NAMED.iter().find(|(_, name)| *name == lower) {
            return Ok(*id);
        }
        u32::from_str_radix(lower.trim_start_matches("0x"), 16).map(Self)
    }
}

// ── Keys ────────────────────────────────────────────────────────────

/// User control code carried by a keypress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyCode(pub u8);

impl KeyCode {
    pub const SELECT: Self = Self(0x00);
    pub const UP: Self = Self(0x01);
    pub const DOWN: Self = Self(0x02);
    pub const LEFT: Self = Self(0x03);
    pub const RIGHT: Self = Self(0x04);
    pub const EXIT: Self = Self(0x0D);
    pub const VOLUME_UP: Self = Self(0x41);
    pub const VOLUME_DOWN: Self = Self(0x42);
    pub const MUTE: Self = Self(0x43);
    pub const PLAY: Self = Self(0x44);
    pub const STOP: Self = Self(0x45);
    pub const PAUSE: Self = Self(0x46);
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypress {
    pub code: KeyCode,
    /// How long the key was held, 0 for the initial press.
    pub duration_ms: u32,
}

impl Keypress {
    pub fn new(code: KeyCode) -> Self {
        Self {
            code,
            duration_ms: 0,
        }
    }
}

// ── Alerts & log messages ───────────────────────────────────────────

/// Out-of-band condition the adapter wants the user to know about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Alert {
    ServiceDevice,
    ConnectionLost,
    PermissionError,
    PortBusy,
    PhysicalAddressError,
    TvPollFailed,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "UPPERCASE")]
pub enum LogLevel {
    Error,
    Warning,
    Notice,
    Traffic,
    Debug,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    pub level: LogLevel,
    pub message: String,
    /// Milliseconds since the adapter was opened.
    pub time_ms: i64,
}

// ── Commands ────────────────────────────────────────────────────────

/// Bus opcode. Only the ones cectray sends or inspects are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Opcode(pub u8);

impl Opcode {
    pub const STANDBY: Self = Self(0x36);
    pub const USER_CONTROL_PRESSED: Self = Self(0x44);
    pub const USER_CONTROL_RELEASE: Self = Self(0x45);
    pub const GIVE_OSD_NAME: Self = Self(0x46);
    pub const SET_STREAM_PATH: Self = Self(0x86);
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// A decoded bus command, as sent or received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusCommand {
    pub initiator: LogicalAddress,
    pub destination: LogicalAddress,
    pub opcode: Opcode,
    #[serde(default)]
    pub parameters: Vec<u8>,
}

impl BusCommand {
    pub fn new(initiator: LogicalAddress, destination: LogicalAddress, opcode: Opcode) -> Self {
        Self {
            initiator,
            destination,
            opcode,
            parameters: Vec::new(),
        }
    }
}

// ── Device info ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PowerStatus {
    On,
    Standby,
    TransitionStandbyToOn,
    TransitionOnToStandby,
    Unknown,
}

/// What the bus knows about one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub address: LogicalAddress,
    pub vendor: VendorId,
    pub physical_address: PhysicalAddress,
    pub power_status: PowerStatus,
    pub osd_name: String,
}
