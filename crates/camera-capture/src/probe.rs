//! Non-invasive capability probing
//!
//! Only filesystem metadata is inspected; devices are never opened here.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Check that `path` exists and is a character device node
pub fn device_node_present(path: &Path) -> bool {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) => {
            debug!("Camera probe: {} unavailable: {}", path.display(), e);
            return false;
        }
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        metadata.file_type().is_char_device()
    }

    #[cfg(not(unix))]
    {
        let _ = metadata;
        false
    }
}

/// List `videoN` device nodes under `dev_dir`, sorted by path
pub fn video_devices(dev_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dev_dir) else {
        return Vec::new();
    };

    let mut devices: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("video"))
        })
        .filter(|path| device_node_present(path))
        .collect();

    devices.sort();
    devices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_node() {
        assert!(!device_node_present(Path::new("/definitely/not/a/video0")));
    }

    #[test]
    fn test_regular_file_is_not_a_device() {
        let manifest = Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");
        assert!(!device_node_present(&manifest));
    }

    #[cfg(unix)]
    #[test]
    fn test_char_device_is_present() {
        assert!(device_node_present(Path::new("/dev/null")));
    }

    #[test]
    fn test_video_devices_missing_dir() {
        assert!(video_devices(Path::new("/definitely/not/a/dir")).is_empty());
    }
}
