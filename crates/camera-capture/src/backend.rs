//! Camera backend traits
//!
//! A [`CameraBackend`] is the explicit handle to the hardware a detector
//! may use. It is passed in by the embedding application rather than
//! looked up globally, so independent detectors never share a device by
//! accident.

use std::future::Future;

use crate::{CameraError, CaptureConstraints, VideoFrame};

/// A source of camera streams.
pub trait CameraBackend: Send + Sync + 'static {
    /// Stream type handed out by [`CameraBackend::open`]
    type Stream: CameraStream;

    /// Human-readable backend name, used in logs
    fn name(&self) -> &str;

    /// Non-invasive capability check.
    ///
    /// Must not open the device, request permission or allocate buffers.
    fn probe(&self) -> bool;

    /// Open the device and negotiate a format close to `constraints`.
    ///
    /// The returned stream holds the hardware handle but is not streaming
    /// yet. Dropping it must release the handle.
    fn open(
        &self,
        constraints: &CaptureConstraints,
    ) -> impl Future<Output = Result<Self::Stream, CameraError>> + Send;
}

/// An opened camera stream.
pub trait CameraStream: Send + 'static {
    /// Begin streaming.
    ///
    /// Runs on the caller's task. It may block only for a bounded time
    /// (buffer allocation and the first driver handshake).
    fn start(&mut self) -> Result<(), CameraError>;

    /// Read the most recent frame, or `None` when nothing is buffered yet
    fn read_frame(&mut self) -> Option<VideoFrame>;

    /// Stop streaming and release the hardware handle.
    ///
    /// Called at most once by [`CaptureSession`][crate::CaptureSession].
    /// Must return only once the handle is released, blocking for at most
    /// one driver poll interval if a reader thread has to be joined.
    fn stop(&mut self);
}
