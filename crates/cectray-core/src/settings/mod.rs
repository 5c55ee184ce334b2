// ── Settings ──
//
// Catalog, typed values, the settings graph, persistence and the derived
// adapter configuration.

mod catalog;
mod derive;
mod graph;
mod store;
mod value;

pub use catalog::{Bounds, EnableRule, SettingKey, SettingSpec, catalog};
pub use derive::recompute_device_config;
pub use graph::{Setting, SettingChange, SettingsGraph};
pub use store::{MemoryStore, SettingsStore};
pub use value::{IdleTimeout, SettingKind, SettingValue};
