// cectray-core: orchestration between settings, host power state and a CEC adapter
//
// Owns the settings graph, the idle/power monitor and the controller that
// turns both into adapter commands. No direct I/O beyond the adapter and
// host traits; the binary wires in concrete implementations.

pub mod actions;
pub mod app;
pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod monitor;
pub mod settings;
pub mod ui;

// ── Primary re-exports ──────────────────────────────────────────
pub use actions::Actions;
pub use app::Application;
pub use config::{ControllerConfig, MonitorConfig};
pub use controller::Controller;
pub use error::CoreError;
pub use model::{AlertQueue, ConnectionState, IdleState, MonitorEvent, PowerEvent};
pub use monitor::{
    HostSample, HostSignals, IdleAndPowerMonitor, RawPowerSignal, translate_power_signal,
};
pub use settings::{
    IdleTimeout, MemoryStore, SettingChange, SettingKey, SettingValue, SettingsGraph,
    SettingsStore, recompute_device_config,
};
pub use ui::{Control, UiCommand};
