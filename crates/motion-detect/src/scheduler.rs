//! Sample Loop Scheduler
//!
//! The host ticks far more often than frames are worth sampling. Each tick
//! checks the time since the last processed sample and either returns
//! straight away or runs one capture-compare-gate cycle. The loop always
//! goes back to waiting for the next tick while the session is active, so
//! a camera that is slow to deliver frames recovers on its own.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use camera_capture::{CameraStream, CaptureSession, VideoFrame};
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace};

use crate::debounce::DebounceGate;
use crate::differencer;
use crate::{MotionCallback, Tuning};

/// Minimum time between two processed samples (~5 Hz)
pub const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(200);

/// Default host tick period (~60 Hz)
pub const HOST_TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Host-provided "next tick" primitive
pub trait TickSource: Send + 'static {
    /// Wait for the next tick and return its timestamp
    fn next_tick(&mut self) -> impl Future<Output = Instant> + Send;
}

/// Tick source backed by a tokio interval
///
/// Ticks missed while a cycle was running are skipped rather than
/// replayed in a burst.
#[derive(Debug)]
pub struct HostClock {
    interval: Interval,
}

impl HostClock {
    /// Tick every `period`. Must be called inside a tokio runtime.
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }
}

impl TickSource for HostClock {
    fn next_tick(&mut self) -> impl Future<Output = Instant> + Send {
        self.interval.tick()
    }
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Too soon after the previous sample; nothing done
    Throttled,
    /// The source had no frame buffered yet
    NotReady,
    /// First frame of the session stored for the next comparison
    Primed,
    /// Frames compared, no meaningful change
    Still { changed_percent: f64 },
    /// Frames compared, change detected; `fired` is false when debounced
    Motion { changed_percent: f64, fired: bool },
    /// The session was taken out of the slot; the loop must end
    Released,
}

/// Preview channel carrying the most recent sampled frame
pub type PreviewSender = watch::Sender<Option<Arc<VideoFrame>>>;

/// Capture session shared between the loop and its owner.
///
/// A tick holds the lock for its whole capture-compare-gate cycle, so
/// whoever empties the slot knows no cycle is running and none will fire
/// afterwards.
pub type SessionSlot<S> = Arc<Mutex<Option<CaptureSession<S>>>>;

fn lock_slot<S: CameraStream>(slot: &SessionSlot<S>) -> MutexGuard<'_, Option<CaptureSession<S>>> {
    // A panic inside a callback must not keep the camera held
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Take the session out of `slot` and release it.
///
/// Returns the number of frames it captured, or `None` if the slot was
/// already empty.
pub fn release_slot<S: CameraStream>(slot: &SessionSlot<S>) -> Option<u64> {
    let mut session = lock_slot(slot).take()?;
    let frames = session.frames_captured();
    session.release();
    Some(frames)
}

/// Capture-compare-gate loop over one capture session
pub struct SampleLoop<S: CameraStream> {
    session: SessionSlot<S>,
    gate: DebounceGate,
    last_sample: Option<Instant>,
    tuning: watch::Receiver<Tuning>,
    on_motion: MotionCallback,
    preview: Option<Arc<PreviewSender>>,
    fired: u64,
}

impl<S: CameraStream> SampleLoop<S> {
    /// Create a loop with a fresh debounce gate over `session`
    pub fn new(session: CaptureSession<S>, tuning: watch::Receiver<Tuning>, on_motion: MotionCallback) -> Self {
        Self {
            session: Arc::new(Mutex::new(Some(session))),
            gate: DebounceGate::new(),
            last_sample: None,
            tuning,
            on_motion,
            preview: None,
            fired: 0,
        }
    }

    /// Publish every sampled frame to `preview`
    pub fn with_preview(mut self, preview: Arc<PreviewSender>) -> Self {
        self.preview = Some(preview);
        self
    }

    /// Handle to the session slot, for releasing it from outside the loop
    pub fn session_slot(&self) -> SessionSlot<S> {
        self.session.clone()
    }

    /// Motion events fired so far
    pub fn fired(&self) -> u64 {
        self.fired
    }

    /// Handle one host tick at `now`
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if let Some(last) = self.last_sample {
            if now.saturating_duration_since(last) < MIN_SAMPLE_INTERVAL {
                return TickOutcome::Throttled;
            }
        }
        self.last_sample = Some(now);

        let mut slot = lock_slot(&self.session);
        let Some(session) = slot.as_mut() else {
            return TickOutcome::Released;
        };

        let Some(current) = session.capture_frame() else {
            return TickOutcome::NotReady;
        };

        if let Some(preview) = &self.preview {
            preview.send_replace(Some(Arc::new(current.clone())));
        }

        let tuning = *self.tuning.borrow();

        let outcome = match session.previous() {
            None => TickOutcome::Primed,
            Some(previous) => {
                let verdict = differencer::evaluate(previous, &current, tuning.sensitivity);
                if verdict.motion {
                    let fired = self.gate.try_fire(now, tuning.debounce);
                    if fired {
                        self.fired += 1;
                        info!(
                            "Motion detected ({:.1}% changed > {:.1}%)",
                            verdict.changed_percent, verdict.threshold_percent
                        );
                        (self.on_motion)();
                    } else {
                        debug!(
                            "Motion suppressed by debounce ({:.1}% changed)",
                            verdict.changed_percent
                        );
                    }
                    TickOutcome::Motion {
                        changed_percent: verdict.changed_percent,
                        fired,
                    }
                } else {
                    TickOutcome::Still {
                        changed_percent: verdict.changed_percent,
                    }
                }
            }
        };

        session.replace_previous(current);
        outcome
    }

    /// Drive the loop from `ticks` until `cancel` turns true, its sender is
    /// dropped or the session is taken, then release the session.
    pub async fn run<T: TickSource>(mut self, mut ticks: T, mut cancel: watch::Receiver<bool>) {
        info!("Sample loop running (every {:?})", MIN_SAMPLE_INTERVAL);

        loop {
            let now = tokio::select! {
                biased;
                changed = cancel.changed() => match changed {
                    Ok(()) if !*cancel.borrow() => continue,
                    _ => break,
                },
                now = ticks.next_tick() => now,
            };

            match self.tick(now) {
                TickOutcome::Throttled => {}
                TickOutcome::Released => break,
                outcome => trace!("Sample tick: {:?}", outcome),
            }
        }

        match release_slot(&self.session) {
            Some(frames) => info!("Sample loop stopped ({} frames, {} events)", frames, self.fired),
            None => info!("Sample loop stopped after external release ({} events)", self.fired),
        }
    }
}
