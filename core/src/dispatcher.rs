//! Command dispatch
//!
//! Maps each typed [`BridgeCommand`] onto exactly one scanning engine call and
//! produces exactly one [`CommandResult`].

use crate::channel::MethodHandler;
use crate::command::{BridgeCommand, Command, CommandResult};
use crate::engine::ScanningEngine;
use crate::scan_period::ScanPeriodConfig;
use std::sync::Arc;

pub const STARTED_MESSAGE: &str = "Started scanning Beacons.";
pub const STOPPED_MESSAGE: &str = "Stopped scanning Beacons.";
pub const SCAN_PERIOD_UPDATED_MESSAGE: &str = "setForegroundScanPeriod updated.";

pub struct CommandDispatcher {
    engine: Arc<dyn ScanningEngine>,
}

impl CommandDispatcher {
    pub fn new(engine: Arc<dyn ScanningEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> Arc<dyn ScanningEngine> {
        self.engine.clone()
    }

    pub fn dispatch(&self, command: &Command) -> CommandResult {
        let parsed = match BridgeCommand::parse(command) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!("Rejected {}: {}", command.name, err);
                return err.into();
            }
        };

        tracing::debug!("Dispatching {}", command.name);

        match parsed {
            BridgeCommand::StartMonitoring => {
                self.engine.start_scanning();
                tracing::info!("Beacon scanning started");
                CommandResult::success(STARTED_MESSAGE)
            }
            BridgeCommand::StopMonitoring => {
                self.engine.stop_monitoring_beacons();
                tracing::info!("Beacon scanning stopped");
                CommandResult::success(STOPPED_MESSAGE)
            }
            BridgeCommand::AddRegion(descriptor) => self.engine.add_region(&descriptor),
            BridgeCommand::ClearRegions(descriptor) => self.engine.clear_regions(&descriptor),
            BridgeCommand::AddBeaconLayout { layout } => {
                self.engine.add_beacon_layout(&layout);
                tracing::info!("Beacon layout added: {}", layout);
                CommandResult::success(format!("Beacon layout added: {}", layout))
            }
            BridgeCommand::SetForegroundScanPeriod {
                foreground_scan_period,
                foreground_between_scan_period,
            } => {
                let periods = ScanPeriodConfig::from_requested(
                    foreground_scan_period,
                    foreground_between_scan_period,
                );
                self.engine
                    .set_foreground_scan_period(periods.foreground(), periods.between());
                tracing::info!(
                    "Foreground scan period {}ms, between {}ms",
                    periods.foreground_scan_period_ms,
                    periods.foreground_between_scan_period_ms
                );
                CommandResult::success(SCAN_PERIOD_UPDATED_MESSAGE)
            }
            BridgeCommand::Unknown(name) => {
                tracing::warn!("Method not implemented: {}", name);
                CommandResult::NotImplemented
            }
        }
    }
}

impl MethodHandler for CommandDispatcher {
    fn on_method_call(&self, command: &Command) -> CommandResult {
        self.dispatch(command)
    }
}
