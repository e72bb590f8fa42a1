//! Ambient Motion Detection
//!
//! Watches a low-resolution camera feed and raises a rate-limited event
//! when meaningful change occurs between two sampled frames:
//! - Sparse frame differencing with a sensitivity-derived threshold
//! - Debounce gate between fired events
//! - Cooperative sample loop throttled to ~5 Hz
//! - Start/stop-able detector with observable status and guaranteed
//!   camera release

pub mod config;
pub mod debounce;
pub mod detector;
pub mod differencer;
pub mod scheduler;
pub mod state;

pub use config::{MotionConfig, Tuning};
pub use debounce::{should_fire, DebounceGate};
pub use detector::MotionDetector;
pub use differencer::{compare, Verdict};
pub use scheduler::{
    release_slot, HostClock, SampleLoop, SessionSlot, TickOutcome, TickSource, MIN_SAMPLE_INTERVAL,
};
pub use state::{DetectorState, DetectorStatus};

use std::sync::Arc;
use thiserror::Error;

/// Callback invoked with no payload on confirmed motion
pub type MotionCallback = Arc<dyn Fn() + Send + Sync>;

/// Configuration error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Sensitivity {0} is out of range [1, 100]")]
    SensitivityOutOfRange(u8),
}
