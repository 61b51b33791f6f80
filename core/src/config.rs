//! Bridge configuration
//!
//! Stored as JSON. Every field has a default, so a partial file is valid.

use crate::channel::{EVENT_CHANNEL, METHOD_CHANNEL};
use crate::BridgeError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Method channel the command handler is registered on
    pub method_channel: String,

    /// Stream channel the event handler is registered on
    pub event_channel: String,

    /// File name of the preference store inside each context's storage dir
    pub preferences_file: String,

    /// Fallback `tracing` filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            method_channel: METHOD_CHANNEL.to_string(),
            event_channel: EVENT_CHANNEL.to_string(),
            preferences_file: "beacon_preferences.json".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.method_channel.trim().is_empty() || self.event_channel.trim().is_empty() {
            return Err(BridgeError::Config(
                "channel names cannot be empty".to_string(),
            ));
        }

        if self.method_channel == self.event_channel {
            return Err(BridgeError::Config(
                "method and event channels must differ".to_string(),
            ));
        }

        if self.preferences_file.trim().is_empty() {
            return Err(BridgeError::Config(
                "preferences_file cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Load and validate a config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BridgeError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("{}: {}", path.display(), e)))?;
        let config: BridgeConfig = serde_json::from_str(&data)
            .map_err(|e| BridgeError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), BridgeError> {
        self.validate()?;
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| BridgeError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), data)
            .map_err(|e| BridgeError::Config(e.to_string()))?;
        Ok(())
    }
}
