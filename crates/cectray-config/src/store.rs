// ── File settings store ──
//
// Persistent settings as a flat TOML table keyed by the stable setting
// names (`global_hdmi_port = "1"`). Saves are staged in memory and written
// on `flush`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use cectray_core::{CoreError, SettingKey, SettingValue, SettingsStore};
use tracing::debug;

use crate::ConfigError;

/// TOML-file implementation of [`SettingsStore`].
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileSettingsStore {
    /// Read `path` if it exists; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), "settings store opened");
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored entries, including keys this version does not know.
    pub fn entries(&self) -> BTreeMap<String, String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget every stored value. Takes effect on the next flush.
    pub fn clear(&self) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn write(&self) -> Result<(), ConfigError> {
        let text = {
            let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
            toml::to_string_pretty(&*values)?
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self, key: SettingKey) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key.to_string())
            .cloned()
    }

    fn save(&self, key: SettingKey, value: &SettingValue) -> Result<(), CoreError> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn flush(&self) -> Result<(), CoreError> {
        self.write().map_err(|e| CoreError::Persistence {
            message: format!("{}: {e}", self.path.display()),
        })?;
        debug!(path = %self.path.display(), "settings written");
        Ok(())
    }
}
