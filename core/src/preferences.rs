//! Beacon preference storage
//!
//! The bridge only needs `init`, re-run on every attach so preferences follow
//! whichever context or surface is current. [`JsonPreferenceStore`] is the
//! file-backed implementation used by the CLI host.

use crate::scan_period::{DEFAULT_FOREGROUND_BETWEEN_SCAN_PERIOD_MS, DEFAULT_FOREGROUND_SCAN_PERIOD_MS};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("Preference store not initialized")]
    NotInitialized,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persisted scanning preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeaconPreferences {
    pub foreground_scan_period_ms: u64,
    pub foreground_between_scan_period_ms: u64,
    /// Layouts registered in earlier sessions, in registration order
    pub layouts: Vec<String>,
}

impl Default for BeaconPreferences {
    fn default() -> Self {
        Self {
            foreground_scan_period_ms: DEFAULT_FOREGROUND_SCAN_PERIOD_MS,
            foreground_between_scan_period_ms: DEFAULT_FOREGROUND_BETWEEN_SCAN_PERIOD_MS,
            layouts: Vec::new(),
        }
    }
}

/// Preference store collaborator. `init` is idempotent and may be called once
/// per attach event.
pub trait PreferenceStore: Send + Sync {
    fn init(&self, dir: &Path) -> Result<(), PreferencesError>;
}

/// JSON file store, rebound to a new directory on each `init`.
pub struct JsonPreferenceStore {
    file_name: String,
    path: RwLock<Option<PathBuf>>,
    current: RwLock<BeaconPreferences>,
}

impl JsonPreferenceStore {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            path: RwLock::new(None),
            current: RwLock::new(BeaconPreferences::default()),
        }
    }

    /// File currently bound, if `init` has run
    pub fn path(&self) -> Option<PathBuf> {
        self.path.read().clone()
    }

    pub fn current(&self) -> BeaconPreferences {
        self.current.read().clone()
    }

    /// Modify and persist the preferences.
    pub fn update<F>(&self, change: F) -> Result<BeaconPreferences, PreferencesError>
    where
        F: FnOnce(&mut BeaconPreferences),
    {
        let path = self.path().ok_or(PreferencesError::NotInitialized)?;

        let mut current = self.current.write();
        let mut next = current.clone();
        change(&mut next);

        let data = serde_json::to_string_pretty(&next)?;
        std::fs::write(&path, data)?;
        *current = next.clone();

        Ok(next)
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn init(&self, dir: &Path) -> Result<(), PreferencesError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);

        let loaded = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            serde_json::from_str(&data)?
        } else {
            BeaconPreferences::default()
        };

        tracing::debug!("Preferences bound to {}", path.display());
        *self.current.write() = loaded;
        *self.path.write() = Some(path);
        Ok(())
    }
}
