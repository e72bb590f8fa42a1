//! Detector state tracking

use camera_capture::CameraError;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a motion detector
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DetectorState {
    #[default]
    Idle,
    /// Probing and acquiring the camera
    Starting,
    /// Sampling loop running
    Active,
    /// Cancelling the loop and releasing the camera; the session is
    /// still held
    Stopping,
    /// Last start attempt failed; nothing is held
    Errored(CameraError),
}

impl DetectorState {
    /// Whether a capture session is held
    pub fn is_active(&self) -> bool {
        matches!(self, DetectorState::Active | DetectorState::Stopping)
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            DetectorState::Idle => "idle",
            DetectorState::Starting => "starting",
            DetectorState::Active => "active",
            DetectorState::Stopping => "stopping",
            DetectorState::Errored(_) => "errored",
        }
    }
}

/// Externally observable detector status
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DetectorStatus {
    /// Whether the environment exposes a camera at all
    pub is_supported: bool,
    /// True while a capture session is held (`Active` and `Stopping`)
    pub is_active: bool,
    /// Human-readable message of the last failure
    pub error: Option<String>,
}

impl DetectorStatus {
    /// Derive the status for `state`
    pub fn derive(is_supported: bool, state: &DetectorState) -> Self {
        Self {
            is_supported,
            is_active: state.is_active(),
            error: match state {
                DetectorState::Errored(e) => Some(e.to_string()),
                _ => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_while_session_held() {
        assert!(DetectorState::Active.is_active());
        // Turns false only once stopping has released the camera
        assert!(DetectorState::Stopping.is_active());
        assert!(DetectorStatus::derive(true, &DetectorState::Stopping).is_active);

        for state in [
            DetectorState::Idle,
            DetectorState::Starting,
            DetectorState::Errored(CameraError::DeviceNotFound),
        ] {
            assert!(!state.is_active(), "{} reported active", state.name());
        }
    }

    #[test]
    fn test_status_carries_error_message() {
        let status = DetectorStatus::derive(true, &DetectorState::Errored(CameraError::PermissionDenied));
        assert!(status.is_supported);
        assert!(!status.is_active);
        assert!(status.error.unwrap().contains("permission denied"));

        let status = DetectorStatus::derive(false, &DetectorState::Idle);
        assert_eq!(status, DetectorStatus::default());
    }
}
