//! Kiosk Motion Host - Main Entry Point

use std::path::PathBuf;

use motion_host::{init_logging, run, HostConfig, DEFAULT_CONFIG_FILE};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::var_os("MOTION_HOST_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = HostConfig::load(&path)?;

    init_logging(&config.log_level, config.log_json);

    info!("=== Kiosk Motion Host v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Config {}: sensitivity {}, debounce {} ms",
        path.display(),
        config.motion.sensitivity,
        config.motion.debounce_ms
    );

    run(config).await
}
