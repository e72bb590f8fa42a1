//! Kiosk Motion Host
//!
//! Embeds one motion detector in a long-running process: loads the
//! layered configuration, selects the camera backend, logs status changes
//! and motion events, and tears the detector down on shutdown.

use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use camera_capture::{CameraBackend, ScriptedCamera};
use config::{Config, Environment, File, FileFormat};
use motion_detect::{MotionConfig, MotionDetector};
use serde::{Deserialize, Serialize};
#[cfg(feature = "v4l2")]
use tracing::debug;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Configuration file read when present
pub const DEFAULT_CONFIG_FILE: &str = "motion-host.toml";

/// Prefix of environment overrides, e.g. `MOTION_HOST__MOTION__SENSITIVITY=20`
pub const ENV_PREFIX: &str = "MOTION_HOST";

/// Camera backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Replays a synthetic scene; needs no hardware
    Scripted,
    /// Video4Linux2 device (requires the `v4l2` feature)
    V4l2,
}

/// Host configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON log lines
    pub log_json: bool,
    /// Camera backend
    pub backend: BackendKind,
    /// Device node for the v4l2 backend
    pub device: String,
    /// Frames between two walk-bys in the scripted scene
    pub demo_period: usize,
    /// Detector configuration
    pub motion: MotionConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            backend: BackendKind::Scripted,
            device: "/dev/video0".to_string(),
            demo_period: 40,
            motion: MotionConfig {
                enabled: true,
                ..Default::default()
            },
        }
    }
}

impl HostConfig {
    /// Load defaults, then `path` (if it exists), then environment overrides
    pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
        Config::builder()
            .add_source(Config::try_from(&HostConfig::default())?)
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Load from an in-memory TOML document
    pub fn from_toml(toml: &str) -> Result<Self, config::ConfigError> {
        Config::builder()
            .add_source(Config::try_from(&HostConfig::default())?)
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

/// Initialize logging
pub fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true);

    let result = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.expect("Failed to set tracing subscriber");
}

/// Run the configured backend until Ctrl-C
pub async fn run(config: HostConfig) -> anyhow::Result<()> {
    config.motion.validate()?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    match config.backend {
        BackendKind::Scripted => {
            info!("Using scripted camera (walk-by every {} frames)", config.demo_period);
            let backend = ScriptedCamera::walk_by(config.demo_period);
            run_until(backend, config.motion, shutdown).await?;
        }
        BackendKind::V4l2 => {
            #[cfg(feature = "v4l2")]
            {
                info!("Using V4L2 camera {}", config.device);
                debug!(
                    "Video devices present: {:?}",
                    camera_capture::probe::video_devices(Path::new("/dev"))
                );
                let backend = camera_capture::v4l2::V4l2Camera::new(&config.device);
                run_until(backend, config.motion, shutdown).await?;
            }
            #[cfg(not(feature = "v4l2"))]
            {
                let _ = shutdown;
                anyhow::bail!(
                    "backend \"v4l2\" for {} requires building with --features v4l2",
                    config.device
                );
            }
        }
    }

    Ok(())
}

/// Run a detector over `backend` until `shutdown` resolves.
///
/// Returns the number of motion events fired.
pub async fn run_until<B, F>(backend: B, motion: MotionConfig, shutdown: F) -> anyhow::Result<u64>
where
    B: CameraBackend,
    F: Future<Output = ()>,
{
    let events = Arc::new(AtomicU64::new(0));
    let counter = events.clone();

    let mut detector = MotionDetector::new(backend, move || {
        let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
        info!("Motion event #{}", n);
    });

    let mut status_rx = detector.subscribe_status();
    let status_logger = tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow_and_update().clone();
            match &status.error {
                Some(e) => warn!("Motion sensing unavailable: {}", e),
                None => info!(
                    "Motion sensing {}",
                    if status.is_active { "active" } else { "inactive" }
                ),
            }
        }
    });

    detector.apply(motion).await?;

    shutdown.await;
    info!("Shutting down motion detector");
    detector.shutdown().await;

    // Ends once the detector, and with it the status sender, is gone
    status_logger.await?;

    let fired = events.load(Ordering::Relaxed);
    info!("Motion host stopped after {} events", fired);
    Ok(fired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_capture::CameraError;
    use std::time::Duration;

    #[test]
    fn test_default_config_enables_detection() {
        let config = HostConfig::default();
        assert!(config.motion.enabled);
        assert_eq!(config.backend, BackendKind::Scripted);
        assert!(config.motion.validate().is_ok());
    }

    #[test]
    fn test_toml_overrides() {
        let config = HostConfig::from_toml(
            r#"
            backend = "v4l2"
            device = "/dev/video2"

            [motion]
            sensitivity = 15
            debounce_ms = 5000
            "#,
        )
        .unwrap();

        assert_eq!(config.backend, BackendKind::V4l2);
        assert_eq!(config.device, "/dev/video2");
        assert_eq!(config.motion.sensitivity, 15);
        assert_eq!(config.motion.debounce_ms, 5000);
        // Unset fields keep the host defaults
        assert!(config.motion.enabled);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_partial_motion_table_keeps_detection_enabled() {
        let config = HostConfig::from_toml("[motion]\nsensitivity = 20\n").unwrap();
        assert_eq!(config.motion.sensitivity, 20);
        assert!(config.motion.enabled);
        assert_eq!(config.motion.debounce_ms, HostConfig::default().motion.debounce_ms);
    }

    #[test]
    fn test_env_override_keeps_detection_enabled() {
        std::env::set_var("MOTION_HOST__MOTION__SENSITIVITY", "20");
        let config = HostConfig::load(Path::new("/definitely/not/motion-host.toml"));
        std::env::remove_var("MOTION_HOST__MOTION__SENSITIVITY");

        let config = config.unwrap();
        assert_eq!(config.motion.sensitivity, 20);
        assert!(config.motion.enabled);
    }

    #[test]
    fn test_explicit_disable_wins() {
        let config = HostConfig::from_toml("[motion]\nenabled = false\n").unwrap();
        assert!(!config.motion.enabled);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = HostConfig::load(Path::new("/definitely/not/motion-host.toml")).unwrap();
        assert_eq!(config.demo_period, HostConfig::default().demo_period);
    }

    #[test]
    fn test_bad_backend_rejected() {
        assert!(HostConfig::from_toml(r#"backend = "firewire""#).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_counts_events() {
        let backend = ScriptedCamera::walk_by(10);
        let probe = backend.clone();
        let motion = MotionConfig {
            enabled: true,
            debounce_ms: 0,
            ..Default::default()
        };

        let fired = run_until(backend, motion, tokio::time::sleep(Duration::from_secs(10)))
            .await
            .unwrap();

        assert!(fired > 0);
        assert_eq!(probe.outstanding_handles(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_survives_missing_camera() {
        let backend = ScriptedCamera::new(vec![]).with_open_error(CameraError::DeviceNotFound);
        let fired = run_until(backend, HostConfig::default().motion, tokio::time::sleep(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(fired, 0);
    }

    #[tokio::test]
    async fn test_run_until_rejects_invalid_config() {
        let motion = MotionConfig {
            enabled: true,
            sensitivity: 150,
            ..Default::default()
        };
        let result = run_until(ScriptedCamera::walk_by(10), motion, async {}).await;
        assert!(result.is_err());
    }
}
