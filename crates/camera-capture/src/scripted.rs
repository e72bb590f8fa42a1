//! Scripted loopback camera
//!
//! Replays a fixed script of frames instead of talking to hardware. Used by
//! the host in demo mode and by tests, which also rely on its handle
//! accounting and failure injection.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::{
    CameraBackend, CameraError, CameraStream, CaptureConstraints, VideoFrame, SURFACE_HEIGHT,
    SURFACE_WIDTH,
};

/// Scripted camera backend
///
/// Clones share handle counters, so a test can keep a clone and inspect
/// it after handing another clone to a detector.
#[derive(Debug, Clone)]
pub struct ScriptedCamera {
    /// Frames replayed in order, cycling forever. `None` entries model
    /// reads where the device had nothing buffered yet.
    script: Arc<Vec<Option<VideoFrame>>>,
    /// Answer given by the capability probe
    supported: bool,
    /// Error returned by `open` instead of a stream
    open_error: Option<CameraError>,
    /// Error returned by `start` after the handle was opened
    start_error: Option<CameraError>,
    /// Simulated acquisition latency
    open_delay: Duration,
    /// Handles opened and not yet released
    outstanding: Arc<AtomicUsize>,
    /// Total successful opens
    opened: Arc<AtomicUsize>,
}

impl ScriptedCamera {
    /// Create a camera replaying `script`
    pub fn new(script: Vec<Option<VideoFrame>>) -> Self {
        Self {
            script: Arc::new(script),
            supported: true,
            open_error: None,
            start_error: None,
            open_delay: Duration::ZERO,
            outstanding: Arc::new(AtomicUsize::new(0)),
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A static scene someone walks through once every `period` frames
    pub fn walk_by(period: usize) -> Self {
        let period = period.max(4);
        let background = VideoFrame::solid(SURFACE_WIDTH, SURFACE_HEIGHT, [40, 40, 40]);

        let mut script = Vec::with_capacity(period);
        for i in 0..period {
            let mut frame = background.clone();
            // A bright figure crosses the left half over the last three frames
            let step = period - i;
            if step <= 3 {
                let x0 = (3 - step as u32) * (SURFACE_WIDTH / 6);
                paint_block(&mut frame, x0, 0, SURFACE_WIDTH / 6, SURFACE_HEIGHT, [230, 220, 200]);
            }
            script.push(Some(frame));
        }

        Self::new(script)
    }

    /// Override the capability probe answer
    pub fn with_support(mut self, supported: bool) -> Self {
        self.supported = supported;
        self
    }

    /// Fail every `open` with `error`
    pub fn with_open_error(mut self, error: CameraError) -> Self {
        self.open_error = Some(error);
        self
    }

    /// Open successfully, then fail `start` with `error`
    pub fn with_start_error(mut self, error: CameraError) -> Self {
        self.start_error = Some(error);
        self
    }

    /// Delay every `open` by `delay`
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Hardware handles currently held
    pub fn outstanding_handles(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Number of successful opens so far
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl CameraBackend for ScriptedCamera {
    type Stream = ScriptedStream;

    fn name(&self) -> &str {
        "scripted"
    }

    fn probe(&self) -> bool {
        self.supported
    }

    fn open(
        &self,
        constraints: &CaptureConstraints,
    ) -> impl Future<Output = Result<ScriptedStream, CameraError>> + Send {
        let camera = self.clone();
        let constraints = constraints.clone();

        async move {
            if !camera.open_delay.is_zero() {
                tokio::time::sleep(camera.open_delay).await;
            }

            if let Some(err) = camera.open_error.clone() {
                return Err(err);
            }

            camera.outstanding.fetch_add(1, Ordering::SeqCst);
            camera.opened.fetch_add(1, Ordering::SeqCst);
            debug!(
                "Scripted camera opened ({}x{} @ {}fps, {} frames)",
                constraints.width,
                constraints.height,
                constraints.fps,
                camera.script.len()
            );

            Ok(ScriptedStream {
                script: camera.script,
                cursor: 0,
                start_error: camera.start_error,
                streaming: false,
                released: false,
                outstanding: camera.outstanding,
            })
        }
    }
}

/// Stream handed out by [`ScriptedCamera`]
#[derive(Debug)]
pub struct ScriptedStream {
    script: Arc<Vec<Option<VideoFrame>>>,
    cursor: usize,
    start_error: Option<CameraError>,
    streaming: bool,
    released: bool,
    outstanding: Arc<AtomicUsize>,
}

impl CameraStream for ScriptedStream {
    fn start(&mut self) -> Result<(), CameraError> {
        if let Some(err) = self.start_error.take() {
            return Err(err);
        }
        self.streaming = true;
        Ok(())
    }

    fn read_frame(&mut self) -> Option<VideoFrame> {
        if !self.streaming || self.script.is_empty() {
            return None;
        }
        let frame = self.script[self.cursor % self.script.len()].clone();
        self.cursor += 1;
        frame
    }

    fn stop(&mut self) {
        self.streaming = false;
        if !self.released {
            self.released = true;
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.stop();
    }
}

fn paint_block(frame: &mut VideoFrame, x0: u32, y0: u32, w: u32, h: u32, rgb: [u8; 3]) {
    for y in y0..(y0 + h).min(frame.height) {
        for x in x0..(x0 + w).min(frame.width) {
            let idx = ((y * frame.width + x) * 3) as usize;
            frame.data[idx..idx + 3].copy_from_slice(&rgb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_and_stop_balance_handles() {
        let camera = ScriptedCamera::new(vec![None]);
        let mut stream = camera.open(&CaptureConstraints::ambient()).await.unwrap();
        assert_eq!(camera.outstanding_handles(), 1);
        assert_eq!(camera.open_count(), 1);

        stream.stop();
        stream.stop();
        assert_eq!(camera.outstanding_handles(), 0);

        drop(stream);
        assert_eq!(camera.outstanding_handles(), 0);
    }

    #[tokio::test]
    async fn test_open_error_holds_nothing() {
        let camera = ScriptedCamera::new(vec![]).with_open_error(CameraError::PermissionDenied);
        let result = camera.open(&CaptureConstraints::ambient()).await;
        assert_eq!(result.unwrap_err(), CameraError::PermissionDenied);
        assert_eq!(camera.outstanding_handles(), 0);
    }

    #[tokio::test]
    async fn test_script_cycles_once_streaming() {
        let a = VideoFrame::solid(2, 2, [1, 1, 1]);
        let camera = ScriptedCamera::new(vec![None, Some(a.clone())]);
        let mut stream = camera.open(&CaptureConstraints::ambient()).await.unwrap();

        // Nothing before start
        assert!(stream.read_frame().is_none());

        stream.start().unwrap();
        assert!(stream.read_frame().is_none());
        assert_eq!(stream.read_frame(), Some(a.clone()));
        assert!(stream.read_frame().is_none());
        assert_eq!(stream.read_frame(), Some(a));
    }

    #[test]
    fn test_walk_by_has_motion() {
        let camera = ScriptedCamera::walk_by(10);
        assert_eq!(camera.script.len(), 10);
        let first = camera.script[0].as_ref().unwrap();
        let last = camera.script[9].as_ref().unwrap();
        assert_ne!(first, last);
        assert_eq!(first.width, SURFACE_WIDTH);
    }
}
