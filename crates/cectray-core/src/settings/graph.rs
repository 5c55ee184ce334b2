// ── Settings graph ──
//
// Key → typed value registry with enable rules. Every value change lands in
// a coalescing outbox that the controller drains with `take_changes()`;
// handlers may write further settings while draining, and those writes merge
// into the same outbox.

use cectray_api::{DeviceType, LogicalAddress, LogicalAddresses, PhysicalAddress, VendorId};
use indexmap::IndexMap;
use tracing::{debug, warn};

use super::catalog::{Bounds, EnableRule, SettingKey, SettingSpec, catalog};
use super::store::SettingsStore;
use super::value::{IdleTimeout, SettingKind, SettingValue};
use crate::error::CoreError;

/// One setting and its current state.
#[derive(Debug, Clone)]
pub struct Setting {
    pub key: SettingKey,
    pub label: &'static str,
    pub value: SettingValue,
    pub default: SettingValue,
    pub bounds: Bounds,
    pub base_enabled: bool,
    pub persistent: bool,
    rule: Option<EnableRule>,
}

impl Setting {
    fn from_spec(spec: SettingSpec) -> Self {
        Self {
            key: spec.key,
            label: spec.label,
            value: spec.default,
            default: spec.default,
            bounds: spec.bounds,
            base_enabled: spec.base_enabled,
            persistent: spec.persistent,
            rule: spec.rule,
        }
    }

    pub fn kind(&self) -> SettingKind {
        self.default.kind()
    }

    pub fn is_default(&self) -> bool {
        self.value == self.default
    }
}

/// A recorded value change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingChange {
    pub key: SettingKey,
    pub old: SettingValue,
    pub new: SettingValue,
}

/// The settings registry.
#[derive(Debug, Clone)]
pub struct SettingsGraph {
    settings: IndexMap<SettingKey, Setting>,
    changes: Vec<SettingChange>,
}

impl Default for SettingsGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsGraph {
    /// A graph holding every catalog setting at its default.
    pub fn new() -> Self {
        let settings = catalog()
            .into_iter()
            .map(|spec| (spec.key, Setting::from_spec(spec)))
            .collect();
        Self {
            settings,
            changes: Vec::new(),
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get(&self, key: SettingKey) -> &Setting {
        // Every key is inserted by `new()` and never removed.
        &self.settings[&key]
    }

    pub fn value(&self, key: SettingKey) -> SettingValue {
        self.get(key).value
    }

    /// Settings in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &Setting> {
        self.settings.values()
    }

    /// Base flag ∧ enable rule, evaluated now.
    pub fn is_enabled(&self, key: SettingKey) -> bool {
        let setting = self.get(key);
        setting.base_enabled && setting.rule.is_none_or(|rule| rule(self))
    }

    /// Boolean value of `key`; `false` for non-boolean settings.
    pub fn flag(&self, key: SettingKey) -> bool {
        matches!(self.value(key), SettingValue::Bool(true))
    }

    pub fn hdmi_port(&self) -> u8 {
        match self.value(SettingKey::HdmiPort) {
            SettingValue::Byte(port) => port,
            _ => 0,
        }
    }

    pub fn connected_device(&self) -> LogicalAddress {
        match self.value(SettingKey::ConnectedDevice) {
            SettingValue::LogicalAddress(address) => address,
            _ => LogicalAddress::Unknown,
        }
    }

    pub fn physical_address(&self) -> PhysicalAddress {
        match self.value(SettingKey::PhysicalAddress) {
            SettingValue::PhysicalAddress(address) => address,
            _ => PhysicalAddress::UNSET,
        }
    }

    pub fn device_type(&self) -> DeviceType {
        match self.value(SettingKey::DeviceType) {
            SettingValue::DeviceType(device_type) => device_type,
            _ => DeviceType::RecordingDevice,
        }
    }

    pub fn tv_vendor(&self) -> VendorId {
        match self.value(SettingKey::TvVendor) {
            SettingValue::VendorId(vendor) => vendor,
            _ => VendorId::UNKNOWN,
        }
    }

    pub fn addresses(&self, key: SettingKey) -> LogicalAddresses {
        match self.value(key) {
            SettingValue::LogicalAddresses(set) => set,
            _ => LogicalAddresses::EMPTY,
        }
    }

    pub fn idle_timeout(&self) -> IdleTimeout {
        match self.value(SettingKey::StandbyScreen) {
            SettingValue::IdleTimeout(timeout) => timeout,
            _ => IdleTimeout::Disabled,
        }
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// User edit: type-checked, bounds-checked and gated by the enable rule.
    pub fn set(&mut self, key: SettingKey, value: SettingValue) -> Result<(), CoreError> {
        self.check_kind(key, &value)?;
        if !self.is_enabled(key) {
            return Err(CoreError::Validation {
                key,
                message: String::from("setting is currently disabled"),
            });
        }
        if let Some(message) = self.get(key).bounds.check(&value) {
            return Err(CoreError::Validation { key, message });
        }
        self.write(key, value);
        Ok(())
    }

    /// Parse `text` according to the setting's type, then [`set`](Self::set).
    pub fn set_from_str(&mut self, key: SettingKey, text: &str) -> Result<(), CoreError> {
        let value = SettingValue::parse(self.get(key).kind(), text)
            .map_err(|message| CoreError::Validation { key, message })?;
        self.set(key, value)
    }

    /// Programmatic write: type-checked only.
    pub fn assign(&mut self, key: SettingKey, value: SettingValue) -> Result<(), CoreError> {
        self.check_kind(key, &value)?;
        self.write(key, value);
        Ok(())
    }

    /// Put every setting back to its default. Changes are recorded.
    pub fn reset_all(&mut self) {
        let defaults: Vec<(SettingKey, SettingValue)> = self
            .settings
            .values()
            .map(|s| (s.key, s.default))
            .collect();
        for (key, value) in defaults {
            self.store_value(key, value);
        }
    }

    /// Set every setting's base enabled flag (the "controls enabled" switch).
    pub fn set_all_enabled(&mut self, enabled: bool) {
        for setting in self.settings.values_mut() {
            setting.base_enabled = enabled;
        }
    }

    pub fn set_enabled(&mut self, key: SettingKey, enabled: bool) {
        if let Some(setting) = self.settings.get_mut(&key) {
            setting.base_enabled = enabled;
        }
    }

    /// Drain the pending changes, oldest first.
    pub fn take_changes(&mut self) -> Vec<SettingChange> {
        std::mem::take(&mut self.changes)
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    fn check_kind(&self, key: SettingKey, value: &SettingValue) -> Result<(), CoreError> {
        let expected = self.get(key).kind();
        if value.kind() == expected {
            Ok(())
        } else {
            Err(CoreError::Validation {
                key,
                message: format!("expected a {expected} value, got a {}", value.kind()),
            })
        }
    }

    /// Store and apply the physical-addressing exclusion: the last of
    /// override / auto-detect to be switched on wins.
    fn write(&mut self, key: SettingKey, value: SettingValue) {
        self.store_value(key, value);
        match (key, value) {
            (SettingKey::OverridePhysicalAddress, SettingValue::Bool(true)) => {
                self.store_value(SettingKey::DetectPhysicalAddress, SettingValue::Bool(false));
            }
            (SettingKey::DetectPhysicalAddress, SettingValue::Bool(true)) => {
                self.store_value(SettingKey::OverridePhysicalAddress, SettingValue::Bool(false));
            }
            _ => {}
        }
    }

    fn store_value(&mut self, key: SettingKey, value: SettingValue) {
        let Some(setting) = self.settings.get_mut(&key) else {
            return;
        };
        let old = setting.value;
        if old == value {
            return;
        }
        setting.value = value;
        self.record(SettingChange {
            key,
            old,
            new: value,
        });
    }

    fn record(&mut self, change: SettingChange) {
        if let Some(pos) = self.changes.iter().position(|c| c.key == change.key) {
            let pending = &mut self.changes[pos];
            pending.new = change.new;
            if pending.old == pending.new {
                self.changes.remove(pos);
            }
        } else {
            self.changes.push(change);
        }
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// Load persistent settings from `store` without recording changes.
    ///
    /// Unparseable stored values are logged and skipped. Returns how many
    /// settings were loaded.
    pub fn load_from(&mut self, store: &dyn SettingsStore) -> usize {
        let mut loaded = 0;
        for setting in self.settings.values_mut().filter(|s| s.persistent) {
            let Some(text) = store.load(setting.key) else {
                continue;
            };
            match SettingValue::parse(setting.kind(), &text) {
                Ok(value) if setting.bounds.check(&value).is_none() => {
                    setting.value = value;
                    loaded += 1;
                }
                Ok(value) => {
                    warn!(key = %setting.key, %value, "stored setting out of bounds, using default");
                }
                Err(e) => {
                    warn!(key = %setting.key, error = %e, "ignoring unreadable stored setting");
                }
            }
        }
        debug!(loaded, "settings loaded");
        loaded
    }

    /// Write every persistent setting to `store` and flush it.
    pub fn save_to(&self, store: &dyn SettingsStore) -> Result<(), CoreError> {
        for setting in self.settings.values().filter(|s| s.persistent) {
            store.save(setting.key, &setting.value)?;
        }
        store.flush()
    }
}
