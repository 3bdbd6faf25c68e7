//! Dedicated producer thread
//!
//! The thread blocks in a bounded wait (HAL `poll`, fd `poll`, interval
//! sleep) and checks its stop flag between waits. Stopping waits at most
//! the join timeout; a thread that has not finished by then is reported
//! and left behind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use contracts::{Result, SensorError};
use tracing::{debug, error};

/// Granularity of interruptible sleeps
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Sleep for `total`, returning early once `stop` is raised
pub fn sleep_unless_stopped(stop: &AtomicBool, total: Duration) {
    let deadline = Instant::now() + total;
    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}

/// Handle on a running reader thread
pub struct ReaderThread {
    stop: Arc<AtomicBool>,
    done: mpsc::Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl ReaderThread {
    /// Spawn `body` on a named thread; it receives the stop flag
    pub fn spawn<F>(name: &str, body: F) -> Result<Self>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done) = mpsc::channel();
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            body(flag);
            let _ = done_tx.send(());
        })?;
        debug!(thread = name, "reader thread started");
        Ok(Self {
            stop,
            done,
            handle: Some(handle),
        })
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Raise the stop flag and wait up to `timeout` for the thread to exit
    pub fn stop(mut self, timeout: Duration) -> Result<()> {
        self.stop.store(true, Ordering::SeqCst);
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take() {
                    let _ = handle.join();
                }
                debug!("reader thread joined");
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => {
                let timeout_ms = timeout.as_millis() as u64;
                error!(timeout_ms, "reader thread did not exit");
                Err(SensorError::ReaderThreadStuck { timeout_ms })
            }
        }
    }
}
