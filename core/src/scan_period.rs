//! Foreground scan cadence with floor-override semantics

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Floor for the active foreground scan window, in milliseconds
pub const DEFAULT_FOREGROUND_SCAN_PERIOD_MS: u64 = 1100;

/// Floor for the rest period between foreground scans, in milliseconds
pub const DEFAULT_FOREGROUND_BETWEEN_SCAN_PERIOD_MS: u64 = 0;

/// Effective foreground scan periods handed to the scanning engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanPeriodConfig {
    pub foreground_scan_period_ms: u64,
    pub foreground_between_scan_period_ms: u64,
}

impl Default for ScanPeriodConfig {
    fn default() -> Self {
        Self {
            foreground_scan_period_ms: DEFAULT_FOREGROUND_SCAN_PERIOD_MS,
            foreground_between_scan_period_ms: DEFAULT_FOREGROUND_BETWEEN_SCAN_PERIOD_MS,
        }
    }
}

impl ScanPeriodConfig {
    /// Apply requested values on top of the floors.
    ///
    /// A requested value only replaces its floor when strictly greater than
    /// it; anything else (including negatives) keeps the floor.
    pub fn from_requested(foreground: Option<i64>, between: Option<i64>) -> Self {
        Self {
            foreground_scan_period_ms: above_floor(foreground, DEFAULT_FOREGROUND_SCAN_PERIOD_MS),
            foreground_between_scan_period_ms: above_floor(
                between,
                DEFAULT_FOREGROUND_BETWEEN_SCAN_PERIOD_MS,
            ),
        }
    }

    pub fn foreground(&self) -> Duration {
        Duration::from_millis(self.foreground_scan_period_ms)
    }

    pub fn between(&self) -> Duration {
        Duration::from_millis(self.foreground_between_scan_period_ms)
    }
}

fn above_floor(requested: Option<i64>, floor: u64) -> u64 {
    match requested {
        Some(value) if value > 0 && value as u64 > floor => value as u64,
        _ => floor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_no_arguments_keeps_floors() {
        let config = ScanPeriodConfig::from_requested(None, None);
        assert_eq!(config.foreground_scan_period_ms, 1100);
        assert_eq!(config.foreground_between_scan_period_ms, 0);
        assert_eq!(config, ScanPeriodConfig::default());
    }

    #[test]
    fn test_value_below_floor_is_ignored() {
        let config = ScanPeriodConfig::from_requested(Some(500), None);
        assert_eq!(config.foreground_scan_period_ms, 1100);
    }

    #[test]
    fn test_value_equal_to_floor_keeps_floor() {
        let config = ScanPeriodConfig::from_requested(Some(1100), Some(0));
        assert_eq!(config, ScanPeriodConfig::default());
    }

    #[test]
    fn test_value_above_floor_overrides() {
        let config = ScanPeriodConfig::from_requested(Some(5000), Some(250));
        assert_eq!(config.foreground(), Duration::from_millis(5000));
        assert_eq!(config.between(), Duration::from_millis(250));
    }

    #[test]
    fn test_negative_values_keep_floors() {
        let config = ScanPeriodConfig::from_requested(Some(-1), Some(-20));
        assert_eq!(config, ScanPeriodConfig::default());
    }

    proptest! {
        #[test]
        fn prop_effective_period_is_max_of_floor_and_request(fg in any::<i64>(), between in any::<i64>()) {
            let config = ScanPeriodConfig::from_requested(Some(fg), Some(between));
            prop_assert_eq!(config.foreground_scan_period_ms, fg.max(1100) as u64);
            prop_assert_eq!(config.foreground_between_scan_period_ms, between.max(0) as u64);
        }
    }
}
