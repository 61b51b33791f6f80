//! Attach/detach lifecycle of the bridge
//!
//! The host wires the bridge into an application context (engine attach) and,
//! separately, into a foreground surface (activity attach). The coordinator
//! owns the [`BridgeContext`] built on engine attach and tears it down on
//! engine detach; command and stream handlers live exactly as long as it does.
//!
//! Transitions:
//! - `Detached -> EngineAttached` on [`LifecycleCoordinator::attach_engine`]
//! - `EngineAttached -> ActivityAttached` on [`LifecycleCoordinator::attach_activity`]
//! - `ActivityAttached -> ActivityAttached` across a config-change detach/reattach pair
//! - `ActivityAttached -> EngineAttached` on [`LifecycleCoordinator::detach_activity`]
//! - `EngineAttached -> Detached` on [`LifecycleCoordinator::detach_engine`]

use crate::channel::Messenger;
use crate::command::{Command, CommandResult};
use crate::config::BridgeConfig;
use crate::dispatcher::CommandDispatcher;
use crate::engine::{EngineFactory, ScanningEngine};
use crate::events::{EventBridge, EventStats, Subscription};
use crate::preferences::PreferenceStore;
use crate::BridgeError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

// ============================================================================
// CONTEXT TYPES
// ============================================================================

/// Application context supplied on engine attach
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostContext {
    pub app_id: String,
    /// Application-wide storage directory
    pub storage_dir: PathBuf,
}

/// Foreground UI surface supplied on activity attach
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySurface {
    pub id: String,
    /// Storage directory scoped to this surface
    pub storage_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// No host context; no handlers registered
    Detached,
    /// Application context and engine present
    EngineAttached,
    /// Foreground surface also present
    ActivityAttached,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Detached => write!(f, "Detached"),
            Self::EngineAttached => write!(f, "EngineAttached"),
            Self::ActivityAttached => write!(f, "ActivityAttached"),
        }
    }
}

/// Everything that exists between engine attach and engine detach.
pub struct BridgeContext {
    pub host: HostContext,
    pub engine: Arc<dyn ScanningEngine>,
    pub dispatcher: Arc<CommandDispatcher>,
    pub events: Arc<EventBridge>,
}

impl BridgeContext {
    fn build(host: HostContext, engine: Arc<dyn ScanningEngine>) -> Self {
        let events = Arc::new(EventBridge::new());
        engine.set_event_sink(Some(events.sink()));
        let dispatcher = Arc::new(CommandDispatcher::new(engine.clone()));

        Self {
            host,
            engine,
            dispatcher,
            events,
        }
    }
}

struct Inner {
    state: LifecycleState,
    context: Option<BridgeContext>,
    surface: Option<ActivitySurface>,
    config_change_pending: bool,
}

// ============================================================================
// COORDINATOR
// ============================================================================

pub struct LifecycleCoordinator {
    config: BridgeConfig,
    messenger: Arc<Messenger>,
    factory: Box<dyn EngineFactory>,
    preferences: Arc<dyn PreferenceStore>,
    inner: Mutex<Inner>,
}

impl LifecycleCoordinator {
    pub fn new(
        config: BridgeConfig,
        messenger: Arc<Messenger>,
        factory: Box<dyn EngineFactory>,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Result<Self, BridgeError> {
        config.validate()?;

        Ok(Self {
            config,
            messenger,
            factory,
            preferences,
            inner: Mutex::new(Inner {
                state: LifecycleState::Detached,
                context: None,
                surface: None,
                config_change_pending: false,
            }),
        })
    }

    /// Coordinator that always attaches the given, already constructed engine
    pub fn with_engine(
        config: BridgeConfig,
        messenger: Arc<Messenger>,
        engine: Arc<dyn ScanningEngine>,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Result<Self, BridgeError> {
        let factory = move |_: &HostContext| -> Arc<dyn ScanningEngine> { engine.clone() };
        Self::new(config, messenger, Box::new(factory), preferences)
    }

    /// Wire the bridge into an application context.
    ///
    /// Transitions: Detached -> EngineAttached. Repeated calls keep the
    /// existing engine and only refresh preferences and handler registration.
    pub fn attach_engine(&self, host: HostContext) -> Result<(), BridgeError> {
        let mut inner = self.inner.lock();
        self.preferences.init(&host.storage_dir)?;

        match inner.context.as_mut() {
            Some(context) => {
                tracing::info!(
                    "Engine attach for {}: reusing existing scanning engine",
                    host.app_id
                );
                context.host = host;
            }
            None => {
                tracing::info!("Engine attach for {}", host.app_id);
                let engine = self.factory.create(&host);
                inner.context = Some(BridgeContext::build(host, engine));
            }
        }

        if let Some(context) = inner.context.as_ref() {
            self.register_handlers(context);
        }
        if inner.state == LifecycleState::Detached {
            inner.state = LifecycleState::EngineAttached;
        }

        Ok(())
    }

    /// A foreground surface became available.
    ///
    /// Transitions: EngineAttached -> ActivityAttached
    pub fn attach_activity(&self, surface: ActivitySurface) -> Result<(), BridgeError> {
        let mut inner = self.inner.lock();

        if inner.state == LifecycleState::Detached {
            return Err(BridgeError::InvalidState(
                "Cannot attach an activity before the engine".to_string(),
            ));
        }

        self.preferences.init(&surface.storage_dir)?;

        if !self.handlers_registered() {
            if let Some(context) = inner.context.as_ref() {
                self.register_handlers(context);
            }
        }

        tracing::info!("Activity attached: {}", surface.id);
        inner.surface = Some(surface);
        inner.config_change_pending = false;
        inner.state = LifecycleState::ActivityAttached;
        Ok(())
    }

    /// First half of a surface re-creation. Nothing is torn down.
    pub fn detach_activity_for_config_changes(&self) -> Result<(), BridgeError> {
        let mut inner = self.inner.lock();

        if inner.state != LifecycleState::ActivityAttached {
            return Err(BridgeError::InvalidState(format!(
                "Cannot detach for config changes from {} state",
                inner.state
            )));
        }

        tracing::info!("Activity detached for config changes");
        inner.config_change_pending = true;
        Ok(())
    }

    /// Second half of a surface re-creation: record the new surface.
    pub fn reattach_activity_for_config_changes(
        &self,
        surface: ActivitySurface,
    ) -> Result<(), BridgeError> {
        let mut inner = self.inner.lock();

        if inner.state != LifecycleState::ActivityAttached {
            return Err(BridgeError::InvalidState(format!(
                "Cannot reattach for config changes from {} state",
                inner.state
            )));
        }

        tracing::info!("Activity reattached after config changes: {}", surface.id);
        inner.surface = Some(surface);
        inner.config_change_pending = false;
        Ok(())
    }

    /// The foreground surface went away; engine and handlers stay live.
    ///
    /// Transitions: ActivityAttached -> EngineAttached
    pub fn detach_activity(&self) -> Result<(), BridgeError> {
        let mut inner = self.inner.lock();

        if inner.state != LifecycleState::ActivityAttached {
            return Err(BridgeError::InvalidState(format!(
                "Cannot detach activity from {} state",
                inner.state
            )));
        }

        tracing::info!("Activity detached");
        inner.surface = None;
        inner.config_change_pending = false;
        inner.state = LifecycleState::EngineAttached;
        Ok(())
    }

    /// Full teardown.
    ///
    /// Transitions: EngineAttached -> Detached (an attached surface is dropped
    /// first). Handlers are unregistered, scanning is stopped once and the
    /// engine is released. The engine is torn down before the lock is
    /// released, so a concurrent attach always sees a fully detached engine.
    pub fn detach_engine(&self) -> Result<(), BridgeError> {
        let mut inner = self.inner.lock();

        if inner.state == LifecycleState::Detached {
            return Err(BridgeError::InvalidState(
                "Engine already detached".to_string(),
            ));
        }

        if inner.surface.take().is_some() {
            tracing::debug!("Dropping activity surface on engine detach");
        }

        self.messenger
            .set_method_handler(&self.config.method_channel, None);
        self.messenger
            .set_stream_handler(&self.config.event_channel, None);

        if let Some(context) = inner.context.take() {
            context.engine.set_event_sink(None);
            context.engine.stop_monitoring_beacons();
            context.events.unsubscribe();
            tracing::info!("Engine detached from {}", context.host.app_id);
        }

        inner.config_change_pending = false;
        inner.state = LifecycleState::Detached;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Host-facing shortcuts over the messenger
    // ------------------------------------------------------------------------

    pub fn dispatch(&self, command: &Command) -> Result<CommandResult, BridgeError> {
        self.messenger.invoke(&self.config.method_channel, command)
    }

    pub fn listen(&self) -> Result<Subscription, BridgeError> {
        self.messenger.listen(&self.config.event_channel)
    }

    pub fn cancel(&self) -> Result<(), BridgeError> {
        self.messenger.cancel(&self.config.event_channel)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    pub fn surface(&self) -> Option<ActivitySurface> {
        self.inner.lock().surface.clone()
    }

    pub fn host_context(&self) -> Option<HostContext> {
        self.inner.lock().context.as_ref().map(|c| c.host.clone())
    }

    pub fn engine(&self) -> Option<Arc<dyn ScanningEngine>> {
        self.inner.lock().context.as_ref().map(|c| c.engine.clone())
    }

    pub fn event_stats(&self) -> Option<EventStats> {
        self.inner.lock().context.as_ref().map(|c| c.events.stats())
    }

    pub fn is_config_change_pending(&self) -> bool {
        self.inner.lock().config_change_pending
    }

    pub fn messenger(&self) -> Arc<Messenger> {
        self.messenger.clone()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    fn handlers_registered(&self) -> bool {
        self.messenger.has_method_handler(&self.config.method_channel)
            && self.messenger.has_stream_handler(&self.config.event_channel)
    }

    fn register_handlers(&self, context: &BridgeContext) {
        self.messenger.set_method_handler(
            &self.config.method_channel,
            Some(context.dispatcher.clone()),
        );
        self.messenger
            .set_stream_handler(&self.config.event_channel, Some(context.events.clone()));
        tracing::debug!(
            "Handlers registered on {} / {}",
            self.config.method_channel,
            self.config.event_channel
        );
    }
}
