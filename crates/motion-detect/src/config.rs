//! Motion detector configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Lowest accepted sensitivity (most sensitive)
pub const MIN_SENSITIVITY: u8 = 1;

/// Highest accepted sensitivity (least sensitive)
pub const MAX_SENSITIVITY: u8 = 100;

/// Motion detector configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Desired detector state; only transitions are acted on
    pub enabled: bool,

    /// Trigger sensitivity in [1, 100], lower is more sensitive.
    /// Motion fires when more than `sensitivity / 10` percent of the
    /// sampled pixels changed.
    pub sensitivity: u8,

    /// Minimum spacing between two fired motion events (milliseconds)
    pub debounce_ms: u64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sensitivity: 30,
            debounce_ms: 3000,
        }
    }
}

impl MotionConfig {
    /// Create responsive config (small changes, frequent events)
    pub fn responsive() -> Self {
        Self {
            sensitivity: 10,
            debounce_ms: 1000,
            ..Default::default()
        }
    }

    /// Create relaxed config (large changes, sparse events)
    pub fn relaxed() -> Self {
        Self {
            sensitivity: 60,
            debounce_ms: 10_000,
            ..Default::default()
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_SENSITIVITY..=MAX_SENSITIVITY).contains(&self.sensitivity) {
            return Err(ConfigError::SensitivityOutOfRange(self.sensitivity));
        }
        Ok(())
    }

    /// Parameters the sample loop reads on every comparison
    pub fn tuning(&self) -> Tuning {
        Tuning {
            sensitivity: self.sensitivity,
            debounce: Duration::from_millis(self.debounce_ms),
        }
    }
}

/// Live-tunable subset of [`MotionConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuning {
    pub sensitivity: u8,
    pub debounce: Duration,
}

impl Default for Tuning {
    fn default() -> Self {
        MotionConfig::default().tuning()
    }
}
