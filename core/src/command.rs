//! Host commands and their results
//!
//! A [`Command`] arrives from the host as a method name plus a loosely typed
//! argument map. [`BridgeCommand::parse`] turns it into a typed command at the
//! dispatch boundary so the dispatcher never does untyped lookups.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Heterogeneous argument map carried by a host command.
pub type Arguments = BTreeMap<String, Value>;

// ============================================================================
// METHOD NAMES
// ============================================================================

pub const START_MONITORING: &str = "startMonitoring";
pub const STOP_MONITORING: &str = "stopMonitoring";
pub const ADD_REGION: &str = "addRegion";
pub const CLEAR_REGIONS: &str = "clearRegions";
pub const ADD_BEACON_LAYOUT: &str = "addBeaconLayoutForAndroid";
pub const SET_FOREGROUND_SCAN_PERIOD: &str = "setForegroundScanPeriodForAndroid";

/// Argument keys
pub const ARG_LAYOUT: &str = "layout";
pub const ARG_FOREGROUND_SCAN_PERIOD: &str = "foregroundScanPeriod";
pub const ARG_FOREGROUND_BETWEEN_SCAN_PERIOD: &str = "foregroundBetweenScanPeriod";

// ============================================================================
// COMMAND
// ============================================================================

/// A single host invocation: method name plus optional arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(alias = "method")]
    pub name: String,
    #[serde(default)]
    pub arguments: Arguments,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Arguments::new(),
        }
    }

    /// Add an argument, builder style.
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }
}

/// Outcome of dispatching one command. Exactly one is produced per command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandResult {
    Success { message: String },
    NotImplemented,
    Error { code: String, message: String },
}

impl CommandResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self::Success {
            message: message.into(),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<ArgumentError> for CommandResult {
    fn from(err: ArgumentError) -> Self {
        CommandResult::error(err.code(), err.to_string())
    }
}

// ============================================================================
// TYPED SCHEMA
// ============================================================================

/// Argument validation failures at the dispatch boundary
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("Missing required argument: {0}")]
    Missing(&'static str),

    #[error("Argument {key} must be {expected}")]
    Invalid {
        key: &'static str,
        expected: &'static str,
    },
}

impl ArgumentError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Missing(_) => "missing-argument",
            Self::Invalid { .. } => "invalid-argument",
        }
    }
}

/// Typed view of a [`Command`]
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeCommand {
    StartMonitoring,
    StopMonitoring,
    /// Region descriptor is engine-specific and passed through untouched.
    AddRegion(Arguments),
    ClearRegions(Arguments),
    AddBeaconLayout {
        layout: String,
    },
    SetForegroundScanPeriod {
        foreground_scan_period: Option<i64>,
        foreground_between_scan_period: Option<i64>,
    },
    Unknown(String),
}

impl BridgeCommand {
    pub fn parse(command: &Command) -> Result<Self, ArgumentError> {
        let args = &command.arguments;
        let parsed = match command.name.as_str() {
            START_MONITORING => Self::StartMonitoring,
            STOP_MONITORING => Self::StopMonitoring,
            ADD_REGION => Self::AddRegion(args.clone()),
            CLEAR_REGIONS => Self::ClearRegions(args.clone()),
            ADD_BEACON_LAYOUT => {
                let layout =
                    optional_string(args, ARG_LAYOUT)?.ok_or(ArgumentError::Missing(ARG_LAYOUT))?;
                Self::AddBeaconLayout { layout }
            }
            SET_FOREGROUND_SCAN_PERIOD => Self::SetForegroundScanPeriod {
                foreground_scan_period: optional_int(args, ARG_FOREGROUND_SCAN_PERIOD)?,
                foreground_between_scan_period: optional_int(
                    args,
                    ARG_FOREGROUND_BETWEEN_SCAN_PERIOD,
                )?,
            },
            other => Self::Unknown(other.to_string()),
        };
        Ok(parsed)
    }
}

/// A JSON `null` counts as absent, matching how host channels encode nulls.
fn optional_string(args: &Arguments, key: &'static str) -> Result<Option<String>, ArgumentError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ArgumentError::Invalid {
            key,
            expected: "a string",
        }),
    }
}

fn optional_int(args: &Arguments, key: &'static str) -> Result<Option<i64>, ArgumentError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_i64().map(Some).ok_or(ArgumentError::Invalid {
            key,
            expected: "an integer",
        }),
    }
}
