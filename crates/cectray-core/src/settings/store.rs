// ── Settings persistence ──
//
// The graph talks to durable storage through `SettingsStore`. Values travel
// in their text form; the graph parses them back with the setting's type.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use super::catalog::SettingKey;
use super::value::SettingValue;
use crate::error::CoreError;

/// Durable key/value storage for persistent settings.
pub trait SettingsStore: Send + Sync {
    /// Stored text form of `key`, if any.
    fn load(&self, key: SettingKey) -> Option<String>;

    /// Stage a value. Implementations may buffer until [`flush`](Self::flush).
    fn save(&self, key: SettingKey, value: &SettingValue) -> Result<(), CoreError>;

    /// Make staged values durable.
    fn flush(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Process-local store, used by tests and when no settings file is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<SettingKey, String>>,
}

impl MemoryStore {
    /// Store a raw text value, bypassing type checks.
    pub fn insert_raw(&self, key: SettingKey, text: &str) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, text.to_owned());
    }

    pub fn len(&self) -> usize {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self, key: SettingKey) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    fn save(&self, key: SettingKey, value: &SettingValue) -> Result<(), CoreError> {
        self.insert_raw(key, &value.to_string());
        Ok(())
    }
}
