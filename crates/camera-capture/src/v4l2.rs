//! Video4Linux2 camera backend
//!
//! Frames are dequeued on a dedicated capture thread, since V4L2 reads
//! block, and handed to the session through a small channel. The session
//! only ever sees the newest frame or `None`.
//!
//! `open` runs on the blocking pool. `start` waits for the capture thread
//! to map its buffers, and `stop` joins the thread, which notices the
//! shutdown flag within [`DEQUEUE_TIMEOUT`]. Both block the calling task
//! for that bounded time so the device is released before `stop` returns.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::frame::decode;
use crate::probe::device_node_present;
use crate::{CameraBackend, CameraError, CameraStream, CaptureConstraints, PixelFormat, VideoFrame};

/// Poll timeout of the capture thread; bounds how long `stop` waits
const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(100);

/// Mmap buffers requested from the driver
const BUFFER_COUNT: u32 = 4;

/// V4L2 camera backend bound to one device node
#[derive(Debug, Clone)]
pub struct V4l2Camera {
    device: PathBuf,
}

impl V4l2Camera {
    /// Create a backend for `device` (e.g. "/dev/video0")
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
        }
    }

    /// Device node this backend opens
    pub fn device(&self) -> &Path {
        &self.device
    }
}

impl CameraBackend for V4l2Camera {
    type Stream = V4l2Stream;

    fn name(&self) -> &str {
        "v4l2"
    }

    fn probe(&self) -> bool {
        device_node_present(&self.device)
    }

    fn open(
        &self,
        constraints: &CaptureConstraints,
    ) -> impl Future<Output = Result<V4l2Stream, CameraError>> + Send {
        let path = self.device.clone();
        let constraints = constraints.clone();

        async move {
            tokio::task::spawn_blocking(move || open_device(&path, &constraints))
                .await
                .map_err(|e| CameraError::Device(format!("open task failed: {}", e)))?
        }
    }
}

fn open_device(path: &Path, constraints: &CaptureConstraints) -> Result<V4l2Stream, CameraError> {
    let device = Device::with_path(path)?;

    let mut format = device.format()?;
    format.width = constraints.width;
    format.height = constraints.height;

    let mut negotiated = None;
    for (fourcc, pixel_format) in [
        (b"RGB3", PixelFormat::Rgb24),
        (b"YUYV", PixelFormat::Yuyv),
        (b"MJPG", PixelFormat::Mjpeg),
    ] {
        format.fourcc = FourCC::new(fourcc);
        match device.set_format(&format) {
            Ok(applied) if applied.fourcc == format.fourcc => {
                negotiated = Some((applied, pixel_format));
                break;
            }
            Ok(applied) => debug!("{} refused {}, driver chose {}", path.display(), format.fourcc, applied.fourcc),
            Err(e) => debug!("{} failed to set {}: {}", path.display(), format.fourcc, e),
        }
    }

    let Some((applied, pixel_format)) = negotiated else {
        return Err(CameraError::Device(format!(
            "{} offers no supported pixel format",
            path.display()
        )));
    };

    if constraints.fps > 0 {
        let params = v4l::video::capture::Parameters::with_fps(constraints.fps);
        if let Err(e) = device.set_params(&params) {
            warn!("Failed to set {}fps on {}: {}", constraints.fps, path.display(), e);
        }
    }

    info!(
        "Opened {} ({}x{} {:?})",
        path.display(),
        applied.width,
        applied.height,
        pixel_format
    );

    Ok(V4l2Stream {
        device: Some(device),
        format: pixel_format,
        width: applied.width,
        height: applied.height,
        frames: None,
        shutdown: Arc::new(AtomicBool::new(false)),
        thread: None,
    })
}

/// Stream over an opened V4L2 device
pub struct V4l2Stream {
    /// Opened device; moved into the capture thread on `start`
    device: Option<Device>,
    format: PixelFormat,
    width: u32,
    height: u32,
    frames: Option<mpsc::Receiver<VideoFrame>>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CameraStream for V4l2Stream {
    fn start(&mut self) -> Result<(), CameraError> {
        let device = self.device.take().ok_or(CameraError::Device("stream already started".into()))?;

        let (frame_tx, frame_rx) = mpsc::channel::<VideoFrame>(2);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), CameraError>>();
        let shutdown = self.shutdown.clone();
        let (format, width, height) = (self.format, self.width, self.height);

        let thread = std::thread::Builder::new()
            .name("v4l2-capture".into())
            .spawn(move || {
                let mut device = device;
                let mut stream = match MmapStream::with_buffers(&mut device, Type::VideoCapture, BUFFER_COUNT) {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.into()));
                        return;
                    }
                };
                stream.set_timeout(DEQUEUE_TIMEOUT);
                let _ = ready_tx.send(Ok(()));

                let mut sequence = 0u64;
                while !shutdown.load(Ordering::SeqCst) {
                    match stream.next() {
                        Ok((buf, _meta)) => {
                            sequence += 1;
                            match decode(buf, format, width, height, sequence) {
                                // Full channel means the sampler is behind; stale frames are dropped
                                Some(frame) => {
                                    let _ = frame_tx.try_send(frame);
                                }
                                None => debug!("Dropped undecodable frame {}", sequence),
                            }
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                        Err(e) => {
                            error!("V4L2 dequeue failed: {}", e);
                            break;
                        }
                    }
                }
                debug!("V4L2 capture thread exiting");
                // `stream` and `device` drop here, releasing buffers and the fd
            })
            .map_err(|e| CameraError::Device(format!("failed to spawn capture thread: {}", e)))?;

        self.thread = Some(thread);

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.frames = Some(frame_rx);
                Ok(())
            }
            Ok(Err(e)) => {
                self.stop();
                Err(e)
            }
            Err(_) => {
                self.stop();
                Err(CameraError::Device("capture thread exited during start".into()))
            }
        }
    }

    fn read_frame(&mut self) -> Option<VideoFrame> {
        let frames = self.frames.as_mut()?;
        let mut latest = None;
        while let Ok(frame) = frames.try_recv() {
            latest = Some(frame);
        }
        latest
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.frames = None;
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("V4L2 capture thread panicked");
            }
        }
        self.device = None;
    }
}

impl Drop for V4l2Stream {
    fn drop(&mut self) {
        self.stop();
    }
}
