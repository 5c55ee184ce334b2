// ── UI commands ──
//
// The controller never touches widgets. It publishes `UiCommand`s on a
// broadcast channel and whatever front end is attached renders them.

use cectray_api::LogMessage;

use crate::settings::{SettingKey, SettingValue};

pub const STATUS_READY: &str = "Ready";
pub const STATUS_TV_POLL_FAILED: &str =
    "Could not poll the TV. Check the HDMI cable and the TV's CEC setting.";
pub const STATUS_ALERT: &str = "The adapter reported a problem";
pub const DEVICE_TYPE_CHANGED: &str =
    "The device type changed. Save the settings and reconnect the adapter to apply it.";

/// A UI element the controller can address directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Setting(SettingKey),
    AlertIcon,
    IdleProgress,
    FirmwareLabel,
    FirmwareVersion,
}

/// Instruction for the attached front end.
#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    Status(String),
    /// Progress of a running device command.
    Progress { percent: u8, visible: bool },
    IdleProgress { percent: u8, visible: bool },
    Log(String),
    AdapterLog(LogMessage),
    ControlEnabled { control: Control, enabled: bool },
    ControlVisible { control: Control, visible: bool },
    ControlText { control: Control, text: String },
    /// Every control at once (disabled while connecting).
    ControlsEnabled(bool),
    ActiveDevices(Vec<String>),
    Alert { visible: bool },
    Title(String),
    /// One-off message the user should acknowledge.
    Warning(String),
    SettingChanged {
        key: SettingKey,
        value: SettingValue,
        enabled: bool,
    },
}
