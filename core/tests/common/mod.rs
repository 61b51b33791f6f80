// Shared test fixtures: a scanning engine that records every call and lets
// the test push detections through whatever sink the bridge installed.

#![allow(dead_code)]

use beacons_bridge_core::{
    ActivitySurface, Arguments, BeaconEvent, BridgeConfig, CommandResult, EventSink, HostContext,
    JsonPreferenceStore, LifecycleCoordinator, Messenger, Proximity, Region, ScanningEngine,
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Start,
    Stop,
    AddRegion(String),
    ClearRegions,
    AddLayout(String),
    ScanPeriod(Duration, Duration),
    SinkInstalled,
    SinkRemoved,
}

#[derive(Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<EngineCall>>,
    regions: Mutex<Vec<Region>>,
    sink: Mutex<Option<EventSink>>,
}

impl RecordingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    /// Calls other than sink installation/removal
    pub fn operations(&self) -> Vec<EngineCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, EngineCall::SinkInstalled | EngineCall::SinkRemoved))
            .collect()
    }

    pub fn count(&self, call: &EngineCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn regions(&self) -> Vec<Region> {
        self.regions.lock().clone()
    }

    pub fn has_sink(&self) -> bool {
        self.sink.lock().is_some()
    }

    /// Push a detection as the engine would. Returns false without a sink.
    pub fn detect(&self, minor: u16) -> bool {
        let sink = self.sink.lock().clone();
        match sink {
            Some(sink) => {
                sink.emit(beacon(minor));
                true
            }
            None => false,
        }
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().push(call);
    }
}

impl ScanningEngine for RecordingEngine {
    fn start_scanning(&self) {
        self.record(EngineCall::Start);
    }

    fn stop_monitoring_beacons(&self) {
        self.record(EngineCall::Stop);
    }

    fn add_region(&self, descriptor: &Arguments) -> CommandResult {
        match Region::from_arguments(descriptor) {
            Ok(region) => {
                self.record(EngineCall::AddRegion(region.identifier.clone()));
                let message = format!("Region Added: {}", region.identifier);
                self.regions.lock().push(region);
                CommandResult::success(message)
            }
            Err(err) => CommandResult::error("invalid-region", err.to_string()),
        }
    }

    fn clear_regions(&self, _descriptor: &Arguments) -> CommandResult {
        self.record(EngineCall::ClearRegions);
        self.regions.lock().clear();
        CommandResult::success("Regions Cleared")
    }

    fn add_beacon_layout(&self, layout: &str) {
        self.record(EngineCall::AddLayout(layout.to_string()));
    }

    fn set_foreground_scan_period(&self, foreground: Duration, between: Duration) {
        self.record(EngineCall::ScanPeriod(foreground, between));
    }

    fn set_event_sink(&self, sink: Option<EventSink>) {
        self.record(if sink.is_some() {
            EngineCall::SinkInstalled
        } else {
            EngineCall::SinkRemoved
        });
        *self.sink.lock() = sink;
    }
}

pub fn beacon(minor: u16) -> BeaconEvent {
    BeaconEvent {
        name: "Lobby".to_string(),
        uuid: "2f234454-cf6d-4a0f-adf2-f4911ba9ffa6".to_string(),
        major: "1".to_string(),
        minor: minor.to_string(),
        distance: 1.2,
        proximity: Proximity::Near,
        rssi: -64,
        tx_power: -59,
        mac_address: "C4:7C:8D:6A:3B:12".to_string(),
        scan_time: 1_700_000_000_000 + minor as u64,
    }
}

pub fn host(root: &Path) -> HostContext {
    HostContext {
        app_id: "com.example.beacons".to_string(),
        storage_dir: root.join("app"),
    }
}

pub fn surface(root: &Path, id: &str) -> ActivitySurface {
    ActivitySurface {
        id: id.to_string(),
        storage_dir: root.join(id),
    }
}

/// Coordinator around a fresh recording engine, already engine-attached.
pub fn attached(root: &Path) -> (LifecycleCoordinator, Arc<RecordingEngine>) {
    let engine = RecordingEngine::new();
    let coordinator = LifecycleCoordinator::with_engine(
        BridgeConfig::default(),
        Arc::new(Messenger::new()),
        engine.clone(),
        Arc::new(JsonPreferenceStore::new("beacon_preferences.json")),
    )
    .expect("default config is valid");
    coordinator
        .attach_engine(host(root))
        .expect("engine attach succeeds");
    (coordinator, engine)
}
