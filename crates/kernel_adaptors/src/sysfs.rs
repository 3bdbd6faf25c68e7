//! File-backed adaptor engine
//!
//! Opens a fixed set of kernel files and hands each one to a
//! [`SampleProcessor`] whenever it has data. In select mode the reader
//! thread waits for `POLLIN`/`POLLPRI` on all descriptors; in interval mode
//! it reads every file once per programmed interval.

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use adaptor_core::{sleep_unless_stopped, write_to_file, AdaptorCore, DeviceAdaptor, PowerStateFile, ReaderThread};
use contracts::{SensorSettings, SessionId};
use metrics::counter;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

/// Upper bound on one `poll` so the stop flag is noticed
const POLL_TIMEOUT_MS: u16 = 200;

/// Pause after a hang-up or a failed `poll`
const POLL_FAILURE_BACKOFF: Duration = Duration::from_secs(1);

/// Used in interval mode before any interval was programmed
const FALLBACK_INTERVAL_MS: u32 = 1000;

pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(3);

/// How the reader thread waits for data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// Wake on descriptor readiness
    Select,
    /// Read every source once per interval
    Interval,
}

/// Decodes data read from one source into sample records
pub trait SampleProcessor: Send + Sync + 'static {
    /// Read whatever is available from `source`; `path_id` is the index of
    /// the path the file was opened from.
    fn process_sample(&self, path_id: usize, source: &File);

    /// Called before the sources are opened. `false` aborts the start.
    fn prepare(&self) -> bool {
        true
    }

    /// Called after the reader thread has stopped
    fn release(&self) {}
}

/// Adaptor reading one or more kernel files on a reader thread
pub struct SysfsAdaptor<P: SampleProcessor> {
    core: AdaptorCore,
    mode: PollMode,
    paths: Vec<PathBuf>,
    processor: Arc<P>,
    interval: Arc<AtomicU32>,
    poll_interval_path: Option<PathBuf>,
    power: PowerStateFile,
    reader: Mutex<Option<ReaderThread>>,
    join_timeout: Duration,
}

impl<P: SampleProcessor> SysfsAdaptor<P> {
    /// An adaptor without paths is marked invalid
    pub fn new(name: &str, mode: PollMode, paths: Vec<PathBuf>, processor: P, settings: &SensorSettings) -> Self {
        let core = AdaptorCore::new(name);
        if paths.is_empty() {
            warn!(adaptor = name, "no source paths, adaptor disabled");
            core.set_valid(false);
        }
        Self {
            core,
            mode,
            paths,
            processor: Arc::new(processor),
            interval: Arc::new(AtomicU32::new(0)),
            poll_interval_path: settings.poll_interval_path.clone(),
            power: PowerStateFile::new(name, settings.powerstate_path.clone()),
            reader: Mutex::new(None),
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn processor(&self) -> &Arc<P> {
        &self.processor
    }

    pub fn mode(&self) -> PollMode {
        self.mode
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    fn open_sources(&self) -> Vec<(usize, File)> {
        self.paths
            .iter()
            .enumerate()
            .filter_map(|(id, path)| match File::open(path) {
                Ok(file) => Some((id, file)),
                Err(e) => {
                    warn!(adaptor = %self.core.name(), path = %path.display(), error = %e, "cannot open source");
                    None
                }
            })
            .collect()
    }

    fn write_poll_interval(&self, path: &Path, interval_ms: u32) -> bool {
        match write_to_file(path, interval_ms.to_string().as_bytes()) {
            Ok(()) => true,
            Err(e) => {
                warn!(adaptor = %self.core.name(), path = %path.display(), error = %e, "failed to write poll interval");
                false
            }
        }
    }
}

/// Seek back to the start so the next read sees a fresh attribute value.
/// Fails harmlessly on pipes and character devices.
fn rewind(file: &File) {
    let mut handle = file;
    let _ = handle.seek(SeekFrom::Start(0));
}

fn run_interval<P: SampleProcessor>(files: Vec<(usize, File)>, processor: Arc<P>, interval: Arc<AtomicU32>, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::Relaxed) {
        for (id, file) in &files {
            processor.process_sample(*id, file);
            rewind(file);
        }
        let ms = match interval.load(Ordering::Relaxed) {
            0 => FALLBACK_INTERVAL_MS,
            ms => ms,
        };
        sleep_unless_stopped(&stop, Duration::from_millis(u64::from(ms)));
    }
}

fn run_select<P: SampleProcessor>(name: String, files: Vec<(usize, File)>, processor: Arc<P>, stop: Arc<AtomicBool>) {
    let wanted = PollFlags::POLLIN | PollFlags::POLLPRI;
    let broken = PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL;
    while !stop.load(Ordering::Relaxed) {
        let mut fds: Vec<PollFd<'_>> = files.iter().map(|(_, f)| PollFd::new(f.as_fd(), wanted)).collect();
        match poll(&mut fds, PollTimeout::from(POLL_TIMEOUT_MS)) {
            Ok(0) => continue,
            Ok(_) => {
                let mut hung_up = false;
                let ready: Vec<usize> = fds
                    .iter()
                    .enumerate()
                    .filter_map(|(i, fd)| {
                        let revents = fd.revents().unwrap_or(PollFlags::empty());
                        if revents.intersects(wanted) {
                            Some(i)
                        } else {
                            hung_up |= revents.intersects(broken);
                            None
                        }
                    })
                    .collect();
                drop(fds);
                for i in ready {
                    let (id, file) = &files[i];
                    processor.process_sample(*id, file);
                    rewind(file);
                }
                if hung_up {
                    warn!(adaptor = %name, "source hung up");
                    sleep_unless_stopped(&stop, POLL_FAILURE_BACKOFF);
                }
            }
            Err(Errno::EINTR) => continue,
            Err(e) => {
                warn!(adaptor = %name, error = %e, "poll failed");
                counter!("sensord_sysfs_poll_errors_total", "adaptor" => name.clone()).increment(1);
                sleep_unless_stopped(&stop, POLL_FAILURE_BACKOFF);
            }
        }
    }
}

impl<P: SampleProcessor> DeviceAdaptor for SysfsAdaptor<P> {
    fn core(&self) -> &AdaptorCore {
        &self.core
    }

    fn start_hardware(&self) -> bool {
        let name = self.core.name().to_string();
        if !self.processor.prepare() {
            warn!(adaptor = %name, "processor refused to start");
            return false;
        }
        let files = self.open_sources();
        if files.is_empty() {
            self.processor.release();
            return false;
        }
        if self.interval.load(Ordering::SeqCst) == 0 {
            self.interval.store(self.core.default_interval(), Ordering::SeqCst);
        }

        let processor = Arc::clone(&self.processor);
        let sources = files.len();
        let spawned = match self.mode {
            PollMode::Interval => {
                let interval = Arc::clone(&self.interval);
                ReaderThread::spawn(&format!("sysfs-{name}"), move |stop| run_interval(files, processor, interval, stop))
            }
            PollMode::Select => {
                let thread_name = name.clone();
                ReaderThread::spawn(&format!("sysfs-{name}"), move |stop| run_select(thread_name, files, processor, stop))
            }
        };
        match spawned {
            Ok(reader) => {
                *self.reader.lock() = Some(reader);
                self.power.set(true);
                info!(adaptor = %name, mode = ?self.mode, sources, "reader started");
                true
            }
            Err(e) => {
                error!(adaptor = %name, error = %e, "failed to spawn reader thread");
                self.processor.release();
                false
            }
        }
    }

    fn stop_hardware(&self) {
        if let Some(reader) = self.reader.lock().take() {
            if let Err(e) = reader.stop(self.join_timeout) {
                error!(adaptor = %self.core.name(), error = %e, "reader did not stop");
            }
        }
        self.processor.release();
        self.power.set(false);
    }

    fn apply_interval(&self, interval_ms: u32, winner: Option<SessionId>) -> bool {
        if interval_ms == self.interval.load(Ordering::SeqCst) {
            return true;
        }
        debug!(
            adaptor = %self.core.name(),
            interval_ms,
            session = winner.map_or(SessionId::SENTINEL, SessionId::get),
            "setting interval"
        );
        if self.mode == PollMode::Select {
            if let Some(path) = &self.poll_interval_path {
                if !self.write_poll_interval(path, interval_ms) {
                    return false;
                }
            }
        }
        self.interval.store(interval_ms, Ordering::SeqCst);
        true
    }

    fn interval(&self) -> u32 {
        self.interval.load(Ordering::SeqCst)
    }
}
