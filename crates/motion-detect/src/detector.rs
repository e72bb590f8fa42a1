//! Motion detector orchestrator
//!
//! Owns the camera backend and drives the state machine
//! `Idle → Starting → Active → Stopping → Idle`, with `Errored` reachable
//! from `Starting`. Start and stop take `&mut self`, so requests on one
//! detector are serialised by ownership.

use std::sync::Arc;
use std::time::Duration;

use camera_capture::{CameraBackend, CameraError, CaptureConstraints, CaptureSession, VideoFrame};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::scheduler::{
    release_slot, HostClock, PreviewSender, SampleLoop, SessionSlot, HOST_TICK_INTERVAL,
};
use crate::state::{DetectorState, DetectorStatus};
use crate::{ConfigError, MotionCallback, MotionConfig, Tuning};

/// Running sample loop and the means to stop it
struct ActiveLoop<B: CameraBackend> {
    cancel: watch::Sender<bool>,
    session: SessionSlot<B::Stream>,
    handle: JoinHandle<()>,
}

/// Start/stop-able motion detector over one camera backend
pub struct MotionDetector<B: CameraBackend> {
    backend: B,
    constraints: CaptureConstraints,
    config: MotionConfig,
    on_motion: MotionCallback,
    /// Capability probe result, evaluated once
    supported: bool,
    state: DetectorState,
    tick_period: Duration,
    tuning: watch::Sender<Tuning>,
    status: watch::Sender<DetectorStatus>,
    preview: Arc<PreviewSender>,
    active: Option<ActiveLoop<B>>,
}

impl<B: CameraBackend> MotionDetector<B> {
    /// Create an idle detector that calls `on_motion` on confirmed motion
    pub fn new<F>(backend: B, on_motion: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let supported = backend.probe();
        if supported {
            info!("Camera capability available via {} backend", backend.name());
        } else {
            warn!("Camera capability not available via {} backend", backend.name());
        }

        let config = MotionConfig::default();
        let state = DetectorState::Idle;
        let (tuning, _) = watch::channel(config.tuning());
        let (status, _) = watch::channel(DetectorStatus::derive(supported, &state));
        let (preview, _) = watch::channel(None);

        Self {
            backend,
            constraints: CaptureConstraints::ambient(),
            config,
            on_motion: Arc::new(on_motion),
            supported,
            state,
            tick_period: HOST_TICK_INTERVAL,
            tuning,
            status,
            preview: Arc::new(preview),
            active: None,
        }
    }

    /// Override the host tick period driving the sample loop
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Apply a configuration.
    ///
    /// Sensitivity and debounce reach a running loop on its next
    /// comparison. `enabled` is edge-triggered: only a change from the
    /// previously applied value starts or stops the detector. Start
    /// failures are reported through the status, not returned.
    pub async fn apply(&mut self, config: MotionConfig) -> Result<(), ConfigError> {
        config.validate()?;

        self.tuning.send_replace(config.tuning());
        let was_enabled = self.config.enabled;
        self.config = config;

        match (was_enabled, self.config.enabled) {
            (false, true) => {
                if let Err(e) = self.start().await {
                    debug!("Enable did not reach active: {}", e);
                }
            }
            (true, false) => self.stop().await,
            _ => {}
        }
        Ok(())
    }

    /// Probe, acquire the camera and start sampling.
    ///
    /// Every failure leaves the detector `Errored` with nothing held.
    pub async fn start(&mut self) -> Result<(), CameraError> {
        if matches!(self.state, DetectorState::Active | DetectorState::Starting) {
            debug!("Start ignored, detector is {}", self.state.name());
            return Ok(());
        }

        // Any previous error is cleared optimistically
        self.transition(DetectorState::Starting);

        if !self.supported {
            return Err(self.fail(CameraError::Unsupported));
        }

        let session = match CaptureSession::acquire(&self.backend, &self.constraints).await {
            Ok(session) => session,
            Err(e) => return Err(self.fail(e)),
        };

        let (cancel, cancel_rx) = watch::channel(false);
        let sample_loop = SampleLoop::new(session, self.tuning.subscribe(), self.on_motion.clone())
            .with_preview(self.preview.clone());
        let session = sample_loop.session_slot();
        let handle = tokio::spawn(sample_loop.run(HostClock::new(self.tick_period), cancel_rx));

        self.active = Some(ActiveLoop {
            cancel,
            session,
            handle,
        });
        self.transition(DetectorState::Active);
        Ok(())
    }

    /// Cancel sampling and release the camera.
    ///
    /// When this returns no tick is scheduled any more and the camera is
    /// released. Stopping an errored detector clears the error.
    ///
    /// `is_active` stays true through `Stopping` and turns false only on
    /// `Idle`, after the camera has been released.
    pub async fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            if self.state != DetectorState::Idle {
                self.transition(DetectorState::Idle);
            }
            return;
        };

        self.transition(DetectorState::Stopping);

        // Fails only if the loop already exited
        let _ = active.cancel.send(true);
        if let Err(e) = active.handle.await {
            error!("Sample loop ended abnormally: {}", e);
        }
        // The loop releases on exit; this covers a loop that panicked
        if release_slot(&active.session).is_some() {
            debug!("Released session left behind by the sample loop");
        }

        self.preview.send_replace(None);
        self.transition(DetectorState::Idle);
    }

    /// Stop and consume the detector
    pub async fn shutdown(mut self) {
        self.stop().await;
    }

    /// Current status snapshot
    pub fn status(&self) -> DetectorStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified on every status change
    pub fn subscribe_status(&self) -> watch::Receiver<DetectorStatus> {
        self.status.subscribe()
    }

    /// Receiver of the most recently sampled frame, for a live preview
    pub fn preview(&self) -> watch::Receiver<Option<Arc<VideoFrame>>> {
        self.preview.subscribe()
    }

    /// Current lifecycle state
    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    /// Last applied configuration
    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Whether the capability probe passed
    pub fn is_supported(&self) -> bool {
        self.supported
    }

    fn fail(&mut self, err: CameraError) -> CameraError {
        warn!("Motion detector failed to start: {}", err);
        self.transition(DetectorState::Errored(err.clone()));
        err
    }

    fn transition(&mut self, state: DetectorState) {
        debug!("Motion detector {} -> {}", self.state.name(), state.name());
        self.state = state;
        self.status
            .send_replace(DetectorStatus::derive(self.supported, &self.state));
    }
}

impl<B: CameraBackend> Drop for MotionDetector<B> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            info!("Motion detector dropped while active, tearing down");
            let _ = active.cancel.send(true);
            active.handle.abort();
            // Waits for a cycle running on another worker; once the slot is
            // empty no further cycle can fire.
            release_slot(&active.session);
            self.preview.send_replace(None);
        }
    }
}
