//! Single-subscriber event stream
//!
//! The engine pushes detections into an [`EventSink`]; the [`EventBridge`]
//! forwards each one to whichever subscriber is currently registered. Only one
//! subscriber exists at a time and a new listen silently displaces the old one.
//! Delivery is best effort: with no subscriber the event is dropped for good.

use crate::channel::StreamHandler;
use crate::engine::BeaconEvent;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Receiving end handed to the host on listen.
#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    pub events: mpsc::UnboundedReceiver<BeaconEvent>,
}

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStats {
    pub delivered: u64,
    pub dropped: u64,
    pub listens: u64,
}

struct Subscriber {
    id: u64,
    tx: mpsc::UnboundedSender<BeaconEvent>,
}

#[derive(Default)]
struct SubscriberSlot {
    current: RwLock<Option<Subscriber>>,
    next_id: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    listens: AtomicU64,
}

impl SubscriberSlot {
    fn forward(&self, event: BeaconEvent) {
        let stale = {
            let current = self.current.read();
            match current.as_ref() {
                Some(sub) => match sub.tx.send(event) {
                    Ok(()) => {
                        self.delivered.fetch_add(1, Ordering::Relaxed);
                        None
                    }
                    Err(_) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        Some(sub.id)
                    }
                },
                None => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!("No subscriber, dropping beacon event");
                    None
                }
            }
        };

        // Receiver went away without a cancel; free the slot unless a newer
        // subscriber already took it.
        if let Some(id) = stale {
            let mut current = self.current.write();
            if current.as_ref().map(|s| s.id) == Some(id) {
                tracing::debug!("Subscriber {} disconnected, clearing slot", id);
                *current = None;
            }
        }
    }
}

// ============================================================================
// EVENT SINK
// ============================================================================

/// Handle the scanning engine pushes detections into.
///
/// Cheap to clone; every clone feeds the same bridge.
#[derive(Clone)]
pub struct EventSink {
    slot: Arc<SubscriberSlot>,
}

impl EventSink {
    pub fn emit(&self, event: BeaconEvent) {
        self.slot.forward(event);
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink").finish_non_exhaustive()
    }
}

// ============================================================================
// EVENT BRIDGE
// ============================================================================

/// Owner of the single subscriber slot
#[derive(Default)]
pub struct EventBridge {
    slot: Arc<SubscriberSlot>,
}

impl EventBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink for the engine; all sinks from one bridge share its slot.
    pub fn sink(&self) -> EventSink {
        EventSink {
            slot: self.slot.clone(),
        }
    }

    /// Register a new subscriber, replacing any existing one.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.slot.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.slot.listens.fetch_add(1, Ordering::Relaxed);

        if let Some(previous) = self.slot.current.write().replace(Subscriber { id, tx }) {
            tracing::debug!("Subscriber {} replaced by {}", previous.id, id);
        }
        tracing::info!("Event subscriber {} registered", id);

        Subscription { id, events: rx }
    }

    pub fn unsubscribe(&self) {
        if let Some(previous) = self.slot.current.write().take() {
            tracing::info!("Event subscriber {} cancelled", previous.id);
        }
    }

    pub fn has_subscriber(&self) -> bool {
        self.slot.current.read().is_some()
    }

    pub fn stats(&self) -> EventStats {
        EventStats {
            delivered: self.slot.delivered.load(Ordering::Relaxed),
            dropped: self.slot.dropped.load(Ordering::Relaxed),
            listens: self.slot.listens.load(Ordering::Relaxed),
        }
    }
}

impl StreamHandler for EventBridge {
    fn on_listen(&self) -> Subscription {
        self.subscribe()
    }

    fn on_cancel(&self) {
        self.unsubscribe();
    }
}
