//! Host channel registry
//!
//! Models the host's messenger: method handlers answer named commands,
//! stream handlers serve a push stream. The host talks to the bridge only
//! through a [`Messenger`]; whatever is registered there decides whether a
//! command can be delivered at all.

use crate::command::{Command, CommandResult};
use crate::events::Subscription;
use crate::BridgeError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Default method channel name
pub const METHOD_CHANNEL: &str = "beacons_plugin";

/// Default event stream channel name
pub const EVENT_CHANNEL: &str = "beacons_plugin_stream";

/// Answers commands on a method channel.
pub trait MethodHandler: Send + Sync {
    fn on_method_call(&self, command: &Command) -> CommandResult;
}

/// Serves a push stream to one listener at a time.
pub trait StreamHandler: Send + Sync {
    fn on_listen(&self) -> Subscription;
    fn on_cancel(&self);
}

#[derive(Default)]
pub struct Messenger {
    methods: RwLock<HashMap<String, Arc<dyn MethodHandler>>>,
    streams: RwLock<HashMap<String, Arc<dyn StreamHandler>>>,
}

impl Messenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (`Some`) or remove (`None`) the handler for a method channel.
    pub fn set_method_handler(&self, channel: &str, handler: Option<Arc<dyn MethodHandler>>) {
        let mut methods = self.methods.write();
        match handler {
            Some(handler) => {
                methods.insert(channel.to_string(), handler);
            }
            None => {
                methods.remove(channel);
            }
        }
    }

    pub fn set_stream_handler(&self, channel: &str, handler: Option<Arc<dyn StreamHandler>>) {
        let mut streams = self.streams.write();
        match handler {
            Some(handler) => {
                streams.insert(channel.to_string(), handler);
            }
            None => {
                streams.remove(channel);
            }
        }
    }

    pub fn has_method_handler(&self, channel: &str) -> bool {
        self.methods.read().contains_key(channel)
    }

    pub fn has_stream_handler(&self, channel: &str) -> bool {
        self.streams.read().contains_key(channel)
    }

    /// Deliver a command. Fails when nothing is registered on `channel`.
    pub fn invoke(&self, channel: &str, command: &Command) -> Result<CommandResult, BridgeError> {
        // Clone the handler out so the registry lock is not held while the
        // engine runs.
        let handler = self.methods.read().get(channel).cloned();
        match handler {
            Some(handler) => Ok(handler.on_method_call(command)),
            None => {
                tracing::warn!(
                    "Rejected {} on {}: no handler registered",
                    command.name,
                    channel
                );
                Err(BridgeError::ChannelUnavailable(channel.to_string()))
            }
        }
    }

    pub fn listen(&self, channel: &str) -> Result<Subscription, BridgeError> {
        let handler = self.streams.read().get(channel).cloned();
        handler
            .map(|h| h.on_listen())
            .ok_or_else(|| BridgeError::ChannelUnavailable(channel.to_string()))
    }

    pub fn cancel(&self, channel: &str) -> Result<(), BridgeError> {
        let handler = self.streams.read().get(channel).cloned();
        handler
            .map(|h| h.on_cancel())
            .ok_or_else(|| BridgeError::ChannelUnavailable(channel.to_string()))
    }
}
