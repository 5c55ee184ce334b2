// ── Runtime configuration ──
//
// These types describe how the controller and monitor behave at runtime.
// They never touch disk: the binary loads its config file and hands these in.

use std::time::Duration;

/// Default cadence of the idle/screensaver poll loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Default window during which repeated screensaver activations are ignored.
pub const DEFAULT_SCREENSAVER_DEBOUNCE: Duration = Duration::from_secs(60);

/// Idle/power monitor tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub screensaver_debounce: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            screensaver_debounce: DEFAULT_SCREENSAVER_DEBOUNCE,
        }
    }
}

/// Controller configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// OSD name announced on the bus.
    pub device_name: String,
    /// Window title prefix used in UI title updates.
    pub app_name: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device_name: String::from("CEC Tray"),
            app_name: String::from("cectray"),
        }
    }
}
