//! Dispatch table tests through the host-facing messenger
//!
//! Every supported command must produce exactly one response matching the
//! table; unknown names produce NotImplemented without touching the engine.

mod common;

use beacons_bridge_core::command::*;
use beacons_bridge_core::{BridgeError, CommandResult};
use common::{attached, EngineCall};
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn test_start_and_stop_monitoring() {
    let dir = tempdir().unwrap();
    let (bridge, engine) = attached(dir.path());

    let started = bridge.dispatch(&Command::new(START_MONITORING)).unwrap();
    assert_eq!(started, CommandResult::success("Started scanning Beacons."));

    let stopped = bridge.dispatch(&Command::new(STOP_MONITORING)).unwrap();
    assert_eq!(stopped, CommandResult::success("Stopped scanning Beacons."));

    assert_eq!(engine.operations(), vec![EngineCall::Start, EngineCall::Stop]);
}

#[test]
fn test_region_commands_delegate_to_engine() {
    let dir = tempdir().unwrap();
    let (bridge, engine) = attached(dir.path());

    let add = Command::new(ADD_REGION)
        .with_arg("identifier", "Lobby")
        .with_arg("uuid", "2F234454-CF6D-4A0F-ADF2-F4911BA9FFA6")
        .with_arg("major", 1);
    assert_eq!(
        bridge.dispatch(&add).unwrap(),
        CommandResult::success("Region Added: Lobby")
    );
    assert_eq!(engine.regions().len(), 1);

    // Engine-produced errors pass through unchanged
    let bad = Command::new(ADD_REGION).with_arg("uuid", "no-identifier");
    match bridge.dispatch(&bad).unwrap() {
        CommandResult::Error { code, .. } => assert_eq!(code, "invalid-region"),
        other => panic!("expected engine error, got {:?}", other),
    }

    assert_eq!(
        bridge.dispatch(&Command::new(CLEAR_REGIONS)).unwrap(),
        CommandResult::success("Regions Cleared")
    );
    assert!(engine.regions().is_empty());
}

#[test]
fn test_layouts_accumulate_without_dedup() {
    let dir = tempdir().unwrap();
    let (bridge, engine) = attached(dir.path());
    let layout = "m:2-3=0215,i:4-19,i:20-21,i:22-23,p:24-24";

    for _ in 0..2 {
        let result = bridge
            .dispatch(&Command::new(ADD_BEACON_LAYOUT).with_arg(ARG_LAYOUT, layout))
            .unwrap();
        assert_eq!(
            result,
            CommandResult::success(format!("Beacon layout added: {}", layout))
        );
    }

    assert_eq!(engine.count(&EngineCall::AddLayout(layout.to_string())), 2);
}

#[test]
fn test_missing_layout_gets_explicit_error() {
    let dir = tempdir().unwrap();
    let (bridge, engine) = attached(dir.path());

    let result = bridge.dispatch(&Command::new(ADD_BEACON_LAYOUT)).unwrap();
    assert_eq!(
        result,
        CommandResult::error("missing-argument", "Missing required argument: layout")
    );
    assert!(engine.operations().is_empty());
}

#[test]
fn test_scan_period_floor_rule() {
    let dir = tempdir().unwrap();
    let (bridge, engine) = attached(dir.path());

    let cases = [
        (Some(500), None, 1100, 0),
        (Some(5000), None, 5000, 0),
        (None, None, 1100, 0),
        (Some(1100), Some(0), 1100, 0),
        (Some(1101), Some(2500), 1101, 2500),
    ];

    for (foreground, between, expected_fg, expected_between) in cases {
        let mut cmd = Command::new(SET_FOREGROUND_SCAN_PERIOD);
        if let Some(v) = foreground {
            cmd = cmd.with_arg(ARG_FOREGROUND_SCAN_PERIOD, v);
        }
        if let Some(v) = between {
            cmd = cmd.with_arg(ARG_FOREGROUND_BETWEEN_SCAN_PERIOD, v);
        }

        assert_eq!(
            bridge.dispatch(&cmd).unwrap(),
            CommandResult::success("setForegroundScanPeriod updated.")
        );
        assert_eq!(
            engine.operations().last(),
            Some(&EngineCall::ScanPeriod(
                Duration::from_millis(expected_fg),
                Duration::from_millis(expected_between)
            ))
        );
    }
}

#[test]
fn test_unknown_command_is_not_implemented() {
    let dir = tempdir().unwrap();
    let (bridge, engine) = attached(dir.path());

    for name in ["startRanging", "", "STARTMONITORING"] {
        assert_eq!(
            bridge.dispatch(&Command::new(name)).unwrap(),
            CommandResult::NotImplemented
        );
    }
    assert!(engine.operations().is_empty());
}

#[test]
fn test_commands_rejected_after_detach() {
    let dir = tempdir().unwrap();
    let (bridge, engine) = attached(dir.path());
    bridge.detach_engine().unwrap();

    let err = bridge.dispatch(&Command::new(START_MONITORING)).unwrap_err();
    assert!(matches!(err, BridgeError::ChannelUnavailable(_)));
    assert_eq!(engine.count(&EngineCall::Start), 0);
}
