// Simulated scanning engine
//
// Stands in for the platform beacon library. The neighbourhood holds one
// advertiser per registered region plus a stray beacon nobody registered.
// Every scan cycle (foreground period + between period) each advertiser is
// attributed to the first region it matches; unmatched ones are ignored, like
// a real ranging engine would.

use beacons_bridge_core::{
    Arguments, BeaconEvent, CommandResult, EventSink, Proximity, Region, ScanPeriodConfig,
    ScanningEngine,
};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Region UUID reported when a region leaves it unconstrained
const DEFAULT_UUID: &str = "2f234454-cf6d-4a0f-adf2-f4911ba9ffa6";

/// Advertiser in range that belongs to no configured deployment
const STRAY_UUID: &str = "fda50693-a4e2-4fb1-afcf-c6eb07647825";
const STRAY_ID: u16 = 9999;

/// Calibrated RSSI at one metre
const TX_POWER: i32 = -59;

struct Shared {
    regions: Mutex<Vec<Region>>,
    periods: Mutex<(Duration, Duration)>,
    sink: Mutex<Option<EventSink>>,
}

pub struct SimulatedEngine {
    runtime: Handle,
    shared: Arc<Shared>,
    layouts: Mutex<Vec<String>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedEngine {
    /// Scan tasks are spawned on `runtime`.
    pub fn new(runtime: Handle) -> Self {
        let defaults = ScanPeriodConfig::default();
        Self {
            runtime,
            shared: Arc::new(Shared {
                regions: Mutex::new(Vec::new()),
                periods: Mutex::new((defaults.foreground(), defaults.between())),
                sink: Mutex::new(None),
            }),
            layouts: Mutex::new(Vec::new()),
            task: Mutex::new(None),
        }
    }

    pub fn layouts(&self) -> Vec<String> {
        self.layouts.lock().clone()
    }
}

impl ScanningEngine for SimulatedEngine {
    fn start_scanning(&self) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            tracing::debug!("Simulated scan already running");
            return;
        }

        let shared = self.shared.clone();
        *task = Some(self.runtime.spawn(async move {
            loop {
                let (foreground, between) = *shared.periods.lock();
                tokio::time::sleep(foreground + between).await;
                scan_cycle(&shared);
            }
        }));
        tracing::info!("Simulated scan started");
    }

    fn stop_monitoring_beacons(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            tracing::info!("Simulated scan stopped");
        }
    }

    fn add_region(&self, descriptor: &Arguments) -> CommandResult {
        match Region::from_arguments(descriptor) {
            Ok(region) => {
                let message = format!("Region Added: {}", region.identifier);
                let mut regions = self.shared.regions.lock();
                regions.retain(|r| r.identifier != region.identifier);
                regions.push(region);
                CommandResult::success(message)
            }
            Err(err) => CommandResult::error("invalid-region", err.to_string()),
        }
    }

    fn clear_regions(&self, _descriptor: &Arguments) -> CommandResult {
        self.shared.regions.lock().clear();
        CommandResult::success("Regions Cleared")
    }

    fn add_beacon_layout(&self, layout: &str) {
        self.layouts.lock().push(layout.to_string());
    }

    fn set_foreground_scan_period(&self, foreground: Duration, between: Duration) {
        *self.shared.periods.lock() = (foreground, between);
    }

    fn set_event_sink(&self, sink: Option<EventSink>) {
        *self.shared.sink.lock() = sink;
    }
}

impl Drop for SimulatedEngine {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

struct Advertiser {
    uuid: String,
    major: u16,
    minor: u16,
}

/// Beacons in range: one built from each region's constraints, then the stray.
fn neighbourhood(regions: &[Region]) -> Vec<Advertiser> {
    let mut advertisers: Vec<Advertiser> = regions
        .iter()
        .enumerate()
        .map(|(index, region)| Advertiser {
            uuid: region.uuid.clone().unwrap_or_else(|| DEFAULT_UUID.to_string()),
            major: region.major.unwrap_or(1),
            minor: region.minor.unwrap_or(index as u16 + 1),
        })
        .collect();
    advertisers.push(Advertiser {
        uuid: STRAY_UUID.to_string(),
        major: STRAY_ID,
        minor: STRAY_ID,
    });
    advertisers
}

fn scan_cycle(shared: &Shared) {
    let Some(sink) = shared.sink.lock().clone() else {
        return;
    };
    let regions = shared.regions.lock().clone();
    let scan_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    let mut rng = rand::thread_rng();
    for (index, beacon) in neighbourhood(&regions).iter().enumerate() {
        let Some(region) = regions
            .iter()
            .find(|r| r.matches(&beacon.uuid, beacon.major, beacon.minor))
        else {
            continue;
        };

        let rssi = TX_POWER - rng.gen_range(0..30);
        let distance = estimate_distance(rssi);

        sink.emit(BeaconEvent {
            name: region.identifier.clone(),
            uuid: beacon.uuid.clone(),
            major: beacon.major.to_string(),
            minor: beacon.minor.to_string(),
            distance,
            proximity: Proximity::from_distance(distance),
            rssi,
            tx_power: TX_POWER,
            mac_address: format!("02:00:00:00:00:{:02X}", index % 256),
            scan_time,
        });
    }
}

/// Log-distance path loss estimate, environment factor 2
fn estimate_distance(rssi: i32) -> f64 {
    let ratio = (TX_POWER - rssi) as f64 / 20.0;
    (10f64.powf(ratio) * 100.0).round() / 100.0
}
