//! Temporary suspend blocker
//!
//! Proximity samples can arrive with the display off. A one second kernel
//! wake lock keeps the system up long enough for the sample to reach the
//! clients.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use metrics::counter;
use parking_lot::Mutex;
use tracing::{debug, warn};

const WAKE_LOCK_REQUEST: &[u8] = b"sensorfwd_pass_data 1000000000\n";

#[derive(Debug, Default)]
struct WakeLockState {
    tried_to_open: bool,
    file: Option<File>,
}

/// Lazily opened handle on the kernel wake lock file
#[derive(Debug)]
pub struct WakeLock {
    path: Option<PathBuf>,
    state: Mutex<WakeLockState>,
}

impl WakeLock {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            state: Mutex::new(WakeLockState::default()),
        }
    }

    /// Wake locks disabled entirely
    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Request a temporary wake lock.
    ///
    /// The file is opened on first use only. After an open or write failure
    /// wake locks stay disabled for the rest of the process.
    pub fn obtain_temporary(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let mut state = self.state.lock();
        if !state.tried_to_open {
            state.tried_to_open = true;
            match OpenOptions::new().read(true).write(true).open(path) {
                Ok(file) => state.file = Some(file),
                Err(e) => warn!(path = %path.display(), error = %e, "wake locks not available"),
            }
        }

        let Some(file) = state.file.as_mut() else {
            return;
        };
        debug!("wake lock to guard sensor data io");
        if let Err(e) = file.write_all(WAKE_LOCK_REQUEST) {
            warn!(error = %e, "wake locking failed");
            state.file = None;
            return;
        }
        counter!("sensord_wakelocks_total").increment(1);
    }

    pub fn is_available(&self) -> bool {
        let state = self.state.lock();
        !state.tried_to_open || state.file.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_request_each_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wake_lock");
        std::fs::write(&path, "").unwrap();

        let lock = WakeLock::new(Some(path.clone()));
        lock.obtain_temporary();
        lock.obtain_temporary();
        let written = std::fs::read(&path).unwrap();
        assert_eq!(written, [WAKE_LOCK_REQUEST, WAKE_LOCK_REQUEST].concat());
    }

    #[test]
    fn test_missing_file_disables() {
        let dir = tempfile::tempdir().unwrap();
        let lock = WakeLock::new(Some(dir.path().join("absent")));
        assert!(lock.is_available());
        lock.obtain_temporary();
        assert!(!lock.is_available());
    }
}
