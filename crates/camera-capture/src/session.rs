//! Scoped capture session
//!
//! A [`CaptureSession`] owns the opened stream, the extraction surface and
//! the previous-frame buffer. Release is total: it is defined for a stream
//! that was opened but never started as well as for a streaming one, it is
//! idempotent, and `Drop` runs it so no exit path can keep the camera.

use tracing::{debug, info, warn};

use crate::{
    CameraBackend, CameraError, CameraStream, CaptureConstraints, VideoFrame, SURFACE_HEIGHT,
    SURFACE_WIDTH,
};

/// Live capture session over one camera stream
pub struct CaptureSession<S: CameraStream> {
    /// Hardware stream; `None` once released
    stream: Option<S>,
    /// Whether `start` succeeded
    streaming: bool,
    /// Off-screen RGB surface frames are scaled into
    surface: Vec<u8>,
    /// Last frame kept for comparison
    previous: Option<VideoFrame>,
    /// Frames extracted so far
    frames_captured: u64,
}

impl<S: CameraStream> CaptureSession<S> {
    /// Open and start a stream on `backend`
    ///
    /// A failure after the device was opened releases it before the error
    /// is returned.
    pub async fn acquire<B>(backend: &B, constraints: &CaptureConstraints) -> Result<Self, CameraError>
    where
        B: CameraBackend<Stream = S>,
    {
        info!(
            "Acquiring camera via {} backend ({}x{} @ {}fps)",
            backend.name(),
            constraints.width,
            constraints.height,
            constraints.fps
        );

        let stream = backend.open(constraints).await?;

        let mut session = Self {
            stream: Some(stream),
            streaming: false,
            surface: Vec::with_capacity((SURFACE_WIDTH * SURFACE_HEIGHT * 3) as usize),
            previous: None,
            frames_captured: 0,
        };

        if let Some(stream) = session.stream.as_mut() {
            if let Err(e) = stream.start() {
                warn!("Camera opened but failed to start streaming: {}", e);
                session.release();
                return Err(e);
            }
        }
        session.streaming = true;

        info!("Capture session started");
        Ok(session)
    }

    /// Extract the next frame into the surface and snapshot it
    ///
    /// Returns `None` when the source has nothing buffered yet or the
    /// session was released.
    pub fn capture_frame(&mut self) -> Option<VideoFrame> {
        let stream = self.stream.as_mut()?;
        let raw = stream.read_frame()?;

        raw.scale_into(&mut self.surface, SURFACE_WIDTH, SURFACE_HEIGHT);
        self.frames_captured += 1;

        Some(VideoFrame::new(
            self.surface.clone(),
            SURFACE_WIDTH,
            SURFACE_HEIGHT,
            self.frames_captured,
        ))
    }

    /// Frame kept from the previous sample, if any
    pub fn previous(&self) -> Option<&VideoFrame> {
        self.previous.as_ref()
    }

    /// Keep `frame` as the previous frame, discarding the old one
    pub fn replace_previous(&mut self, frame: VideoFrame) {
        self.previous = Some(frame);
    }

    /// Frames extracted since acquisition
    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    /// Whether the session still holds its stream
    pub fn is_live(&self) -> bool {
        self.stream.is_some()
    }

    /// Stop the stream, release the hardware handle and drop all buffers.
    ///
    /// Safe to call any number of times.
    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            info!(
                "Capture session released after {} frames (streaming: {})",
                self.frames_captured, self.streaming
            );
        } else {
            debug!("Capture session already released");
        }

        self.streaming = false;
        self.previous = None;
        self.surface = Vec::new();
    }
}

impl<S: CameraStream> Drop for CaptureSession<S> {
    fn drop(&mut self) {
        self.release();
    }
}
