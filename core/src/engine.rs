//! Scanning engine collaborator interface
//!
//! The engine performs the actual beacon detection (ranging, monitoring,
//! layout parsing). The bridge only drives it through [`ScanningEngine`] and
//! receives detections through the [`EventSink`] it hands over on attach.

use crate::command::{Arguments, CommandResult};
use crate::events::EventSink;
use crate::lifecycle::HostContext;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// ENGINE TRAIT
// ============================================================================

/// Operations the bridge needs from a beacon scanning engine.
///
/// Implementations are called from the host's command context and must not
/// block on scan results; detection happens on the engine's own schedule.
#[cfg_attr(test, mockall::automock)]
pub trait ScanningEngine: Send + Sync {
    /// Begin ranging/monitoring the registered regions.
    fn start_scanning(&self);

    /// Stop all active scanning.
    fn stop_monitoring_beacons(&self);

    /// Register a region; result production is the engine's responsibility.
    fn add_region(&self, descriptor: &Arguments) -> CommandResult;

    /// Drop regions; result production is the engine's responsibility.
    fn clear_regions(&self, descriptor: &Arguments) -> CommandResult;

    /// Register an additional advertisement layout.
    fn add_beacon_layout(&self, layout: &str);

    fn set_foreground_scan_period(&self, foreground: Duration, between: Duration);

    /// Install or remove the sink detection events are pushed into.
    fn set_event_sink(&self, sink: Option<EventSink>);
}

/// Builds the engine bound to an application context.
pub trait EngineFactory: Send + Sync {
    fn create(&self, context: &HostContext) -> Arc<dyn ScanningEngine>;
}

impl<F> EngineFactory for F
where
    F: Fn(&HostContext) -> Arc<dyn ScanningEngine> + Send + Sync,
{
    fn create(&self, context: &HostContext) -> Arc<dyn ScanningEngine> {
        self(context)
    }
}

// ============================================================================
// DETECTION PAYLOAD
// ============================================================================

/// Proximity bucket reported alongside a distance estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Proximity {
    Immediate,
    Near,
    Far,
    Unknown,
}

impl Proximity {
    /// Bucket a distance estimate in metres.
    pub fn from_distance(distance_m: f64) -> Self {
        if distance_m < 0.0 || distance_m.is_nan() {
            Proximity::Unknown
        } else if distance_m < 0.5 {
            Proximity::Immediate
        } else if distance_m <= 3.0 {
            Proximity::Near
        } else {
            Proximity::Far
        }
    }
}

/// A single beacon detection as streamed to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeaconEvent {
    /// Region identifier the beacon was attributed to
    pub name: String,
    pub uuid: String,
    pub major: String,
    pub minor: String,
    /// Estimated distance in metres
    pub distance: f64,
    pub proximity: Proximity,
    pub rssi: i32,
    pub tx_power: i32,
    pub mac_address: String,
    /// Detection time, milliseconds since the Unix epoch
    pub scan_time: u64,
}

impl BeaconEvent {
    /// JSON string form pushed over the host event stream
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ============================================================================
// REGION DESCRIPTOR
// ============================================================================

/// Rejected region descriptor
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegionError {
    #[error("identifier must be a non-empty string")]
    MissingIdentifier,

    #[error("uuid must be a string")]
    InvalidUuid,

    #[error("{0} must be an integer between 0 and 65535")]
    OutOfRange(&'static str),
}

/// Typed region descriptor for engines that accept the common
/// `identifier`/`uuid`/`major`/`minor` argument shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub identifier: String,
    pub uuid: Option<String>,
    pub major: Option<u16>,
    pub minor: Option<u16>,
}

impl Region {
    pub fn from_arguments(args: &Arguments) -> Result<Self, RegionError> {
        let identifier = match args.get("identifier") {
            Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
            _ => return Err(RegionError::MissingIdentifier),
        };

        let uuid = match args.get("uuid") {
            None | Some(Value::Null) => None,
            Some(Value::String(uuid)) => Some(uuid.to_lowercase()),
            Some(_) => return Err(RegionError::InvalidUuid),
        };

        Ok(Self {
            identifier,
            uuid,
            major: id_component(args, "major")?,
            minor: id_component(args, "minor")?,
        })
    }

    /// Whether a detection with these identifiers belongs to this region.
    pub fn matches(&self, uuid: &str, major: u16, minor: u16) -> bool {
        self.uuid
            .as_deref()
            .map_or(true, |u| u.eq_ignore_ascii_case(uuid))
            && self.major.map_or(true, |m| m == major)
            && self.minor.map_or(true, |m| m == minor)
    }
}

/// Major/minor arrive either as integers or as decimal strings.
fn id_component(args: &Arguments, key: &'static str) -> Result<Option<u16>, RegionError> {
    let parsed = match args.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u16::try_from(v).ok()),
        Some(Value::String(s)) if s.is_empty() => return Ok(None),
        Some(Value::String(s)) => s.parse::<u16>().ok(),
        Some(_) => None,
    };
    parsed.map(Some).ok_or(RegionError::OutOfRange(key))
}
