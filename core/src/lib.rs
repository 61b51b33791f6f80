// Beacons Bridge — command/event bridge between a host application and a
// proximity-beacon scanning engine.
//
// The host talks through a `Messenger`: named commands go in on the method
// channel, detections come out on the single-subscriber event channel. The
// `LifecycleCoordinator` decides when those channels exist.

pub mod channel;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod events;
pub mod lifecycle;
pub mod preferences;
pub mod scan_period;

use thiserror::Error;

pub use channel::{Messenger, MethodHandler, StreamHandler, EVENT_CHANNEL, METHOD_CHANNEL};
pub use command::{Arguments, ArgumentError, BridgeCommand, Command, CommandResult};
pub use config::BridgeConfig;
pub use dispatcher::CommandDispatcher;
pub use engine::{BeaconEvent, EngineFactory, Proximity, Region, RegionError, ScanningEngine};
pub use events::{EventBridge, EventSink, EventStats, Subscription};
pub use lifecycle::{ActivitySurface, BridgeContext, HostContext, LifecycleCoordinator, LifecycleState};
pub use preferences::{BeaconPreferences, JsonPreferenceStore, PreferenceStore, PreferencesError};
pub use scan_period::ScanPeriodConfig;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Invalid lifecycle state: {0}")]
    InvalidState(String),

    /// Nothing registered on the channel, typically because the bridge is detached
    #[error("No handler registered on channel {0}")]
    ChannelUnavailable(String),

    #[error("Preferences error: {0}")]
    Preferences(#[from] PreferencesError),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ============================================================================
// LOGGING
// ============================================================================

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `default_filter`. Safe to call more than once; later
/// calls are no-ops.
pub fn init_logging(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .try_init();
}
