//! Camera Capture Library for Ambient Motion Sensing
//!
//! Provides scoped acquisition of a single camera and extraction of
//! low-resolution RGB frames for cheap frame-to-frame comparison.
//! Supports:
//! - Capability probing without opening the device
//! - Two-phase acquisition (open, then stream) with release on every path
//! - Normalisation of delivered frames into a fixed 320x240 RGB surface
//! - A scripted loopback backend and, behind the `v4l2` feature, V4L2 devices

pub mod backend;
pub mod frame;
pub mod probe;
pub mod scripted;
pub mod session;
#[cfg(feature = "v4l2")]
pub mod v4l2;

pub use backend::{CameraBackend, CameraStream};
pub use frame::{PixelFormat, VideoFrame};
pub use scripted::{ScriptedCamera, ScriptedStream};
pub use session::CaptureSession;

use thiserror::Error;

/// Width of the extraction surface every captured frame is scaled into
pub const SURFACE_WIDTH: u32 = 320;

/// Height of the extraction surface every captured frame is scaled into
pub const SURFACE_HEIGHT: u32 = 240;

/// Camera error types
///
/// Every variant leaves the caller in the same terminal state: no session,
/// error reported. A frame that is not ready yet is not an error and is
/// reported as `None` by the capture path instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Camera access is not supported in this environment")]
    Unsupported,

    #[error("Camera permission denied. Allow camera access and enable motion sensing again.")]
    PermissionDenied,

    #[error("No camera found. Connect a camera and enable motion sensing again.")]
    DeviceNotFound,

    #[error("Camera error: {0}")]
    Device(String),
}

impl From<std::io::Error> for CameraError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => CameraError::PermissionDenied,
            std::io::ErrorKind::NotFound => CameraError::DeviceNotFound,
            _ => CameraError::Device(err.to_string()),
        }
    }
}

/// Capture constraints requested from a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConstraints {
    /// Requested capture width
    pub width: u32,
    /// Requested capture height
    pub height: u32,
    /// Frame rate hint; backends may deliver at any rate
    pub fps: u32,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self::ambient()
    }
}

impl CaptureConstraints {
    /// Low-cost constraints used for ambient motion sensing (320x240 @ 10fps)
    pub fn ambient() -> Self {
        Self {
            width: SURFACE_WIDTH,
            height: SURFACE_HEIGHT,
            fps: 10,
        }
    }
}
