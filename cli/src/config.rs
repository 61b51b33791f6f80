// Configuration management for the bridge CLI
//
// Bridge config stored in:
// - macOS: ~/Library/Application Support/beacons-bridge/bridge.json
// - Linux: ~/.config/beacons-bridge/bridge.json
// - Windows: %APPDATA%\beacons-bridge\bridge.json

use anyhow::{Context, Result};
use beacons_bridge_core::BridgeConfig;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "beacons-bridge";

/// Get the config directory path (cross-platform)
pub fn config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Failed to determine config directory")?
        .join(APP_DIR);

    std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

    Ok(config_dir)
}

/// Get the data directory path (cross-platform)
pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .context("Failed to determine data directory")?
        .join(APP_DIR);

    std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

    Ok(data_dir)
}

pub fn default_config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("bridge.json"))
}

/// Load config from `path`, or from the default location.
///
/// A missing default file yields defaults; a missing explicit file is an error.
pub fn load(path: Option<&Path>) -> Result<BridgeConfig> {
    match path {
        Some(path) => BridgeConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => {
            let file = default_config_file()?;
            if file.exists() {
                BridgeConfig::load(&file)
                    .with_context(|| format!("Failed to load config {}", file.display()))
            } else {
                Ok(BridgeConfig::default())
            }
        }
    }
}

/// Set a config value by key and return the updated config
pub fn set(mut config: BridgeConfig, key: &str, value: &str) -> Result<BridgeConfig> {
    match key {
        "method_channel" => config.method_channel = value.to_string(),
        "event_channel" => config.event_channel = value.to_string(),
        "preferences_file" => config.preferences_file = value.to_string(),
        "log_filter" => config.log_filter = value.to_string(),
        _ => anyhow::bail!("Unknown config key: {}", key),
    }
    config.validate().context("Invalid config value")?;
    Ok(config)
}

pub fn get(config: &BridgeConfig, key: &str) -> Option<String> {
    match key {
        "method_channel" => Some(config.method_channel.clone()),
        "event_channel" => Some(config.event_channel.clone()),
        "preferences_file" => Some(config.preferences_file.clone()),
        "log_filter" => Some(config.log_filter.clone()),
        _ => None,
    }
}
