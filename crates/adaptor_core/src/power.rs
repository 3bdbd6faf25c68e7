//! Sysfs control-file writes

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use contracts::Result;
use tracing::{trace, warn};

/// Write `content` to an existing control file
pub fn write_to_file(path: &Path, content: &[u8]) -> Result<()> {
    trace!(path = %path.display(), content = %String::from_utf8_lossy(content), "writing control file");
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.write_all(content)?;
    Ok(())
}

/// Optional power-state toggle for one sensor.
///
/// Receives `1` when hardware starts and `0` when it stops. A configured
/// path that does not exist is dropped at construction.
#[derive(Debug, Clone, Default)]
pub struct PowerStateFile {
    path: Option<PathBuf>,
}

impl PowerStateFile {
    pub fn new(owner: &str, path: Option<PathBuf>) -> Self {
        let path = path.filter(|p| {
            let exists = p.exists();
            if !exists {
                warn!(adaptor = %owner, path = %p.display(), "power state path does not exist");
            }
            exists
        });
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the power state; failures are logged and absorbed
    pub fn set(&self, on: bool) {
        if let Some(path) = &self.path {
            let content: &[u8] = if on { b"1" } else { b"0" };
            if let Err(e) = write_to_file(path, content) {
                warn!(path = %path.display(), error = %e, "failed to write power state");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_state_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enable");
        std::fs::write(&path, "").unwrap();

        let power = PowerStateFile::new("stepcounteradaptor", Some(path.clone()));
        power.set(true);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1");
        power.set(false);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0");
    }

    #[test]
    fn test_missing_path_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let power = PowerStateFile::new("gyroscopeadaptor", Some(dir.path().join("nope")));
        assert!(power.path().is_none());
        power.set(true);
    }
}
