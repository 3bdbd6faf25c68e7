//! SensorManager - adaptor registry, channels and sessions
//!
//! Adaptors are constructed by the composition root and registered here by
//! name. Channels take a counted reference on their adaptor for as long as
//! they are loaded; the first reference starts the adaptor and the last
//! release stops it. Sessions are opened against a channel and all control
//! calls are routed through their id.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use adaptor_core::DeviceAdaptor;
use contracts::{DataRange, Result, SensorError, SensorName, SensorRecord, SessionId};
use metrics::gauge;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tracing::{debug, info, instrument, warn};

use crate::channel::{ChannelControl, ChannelInfo, SensorChannel};

struct AdaptorSlot {
    adaptor: Arc<dyn DeviceAdaptor>,
    refs: usize,
}

/// Owner of every adaptor, channel and session in the daemon
pub struct SensorManager {
    adaptors: Mutex<BTreeMap<SensorName, AdaptorSlot>>,
    channels: RwLock<BTreeMap<SensorName, Arc<dyn ChannelControl>>>,
    sessions: Mutex<BTreeMap<SessionId, SensorName>>,
    next_session: AtomicI32,
    display_on: AtomicBool,
}

impl Default for SensorManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorManager {
    pub fn new() -> Self {
        Self {
            adaptors: Mutex::new(BTreeMap::new()),
            channels: RwLock::new(BTreeMap::new()),
            sessions: Mutex::new(BTreeMap::new()),
            next_session: AtomicI32::new(1),
            display_on: AtomicBool::new(true),
        }
    }

    /// Make an adaptor available under its own name; `false` on duplicates
    pub fn register_adaptor(&self, adaptor: Arc<dyn DeviceAdaptor>) -> bool {
        let name = adaptor.core().name().clone();
        let mut adaptors = self.adaptors.lock();
        if adaptors.contains_key(&name) {
            warn!(adaptor = %name, "adaptor already registered");
            return false;
        }
        if !self.display_on.load(Ordering::SeqCst) {
            adaptor.standby();
        }
        info!(adaptor = %name, valid = adaptor.is_valid(), "adaptor registered");
        adaptors.insert(name, AdaptorSlot { adaptor, refs: 0 });
        true
    }

    pub fn adaptor(&self, name: &str) -> Option<Arc<dyn DeviceAdaptor>> {
        self.adaptors.lock().get(name).map(|slot| Arc::clone(&slot.adaptor))
    }

    pub fn adaptor_names(&self) -> Vec<SensorName> {
        self.adaptors.lock().keys().cloned().collect()
    }

    pub fn adaptor_reference_count(&self, name: &str) -> usize {
        self.adaptors.lock().get(name).map_or(0, |slot| slot.refs)
    }

    /// Take a reference on a valid adaptor, starting it on the first one
    #[instrument(name = "manager_request_adaptor", skip(self))]
    pub fn request_device_adaptor(&self, name: &str) -> Result<Arc<dyn DeviceAdaptor>> {
        let mut adaptors = self.adaptors.lock();
        let slot = adaptors
            .get_mut(name)
            .ok_or_else(|| SensorError::AdaptorNotFound { name: name.to_string() })?;
        if !slot.adaptor.is_valid() {
            return Err(SensorError::adaptor_invalid(name, "hardware not available"));
        }
        if slot.refs == 0 && !slot.adaptor.start_adaptor() {
            return Err(SensorError::adaptor_invalid(name, "adaptor failed to start"));
        }
        slot.refs += 1;
        debug!(refs = slot.refs, "adaptor requested");
        Ok(Arc::clone(&slot.adaptor))
    }

    /// Drop a reference; the last one stops the adaptor
    #[instrument(name = "manager_release_adaptor", skip(self))]
    pub fn release_device_adaptor(&self, name: &str) -> Result<()> {
        let mut adaptors = self.adaptors.lock();
        let slot = adaptors
            .get_mut(name)
            .ok_or_else(|| SensorError::AdaptorNotFound { name: name.to_string() })?;
        match slot.refs {
            0 => warn!("release without matching request"),
            1 => {
                slot.refs = 0;
                slot.adaptor.stop_adaptor();
                debug!("adaptor released");
            }
            _ => slot.refs -= 1,
        }
        Ok(())
    }

    /// Create the channel `name` over `adaptor_name`'s `output` (primary
    /// output when `None`) and keep the adaptor referenced until unload.
    ///
    /// Must be called inside a tokio runtime.
    #[instrument(name = "manager_load_channel", skip(self), fields(channel = %name, adaptor = %adaptor_name))]
    pub fn load_channel<T: SensorRecord>(
        &self,
        name: &str,
        adaptor_name: &str,
        output: Option<&str>,
    ) -> Result<Arc<SensorChannel<T>>> {
        let runtime = Handle::try_current().map_err(|e| SensorError::Other(e.to_string()))?;
        let mut channels = self.channels.write();
        let Entry::Vacant(slot) = channels.entry(SensorName::new(name)) else {
            return Err(SensorError::Other(format!("channel '{name}' already loaded")));
        };
        let adaptor = self.request_device_adaptor(adaptor_name)?;
        let channel = match SensorChannel::<T>::new(name, adaptor, output, runtime) {
            Ok(channel) => Arc::new(channel),
            Err(e) => {
                self.release_device_adaptor(adaptor_name)?;
                return Err(e);
            }
        };
        slot.insert(Arc::clone(&channel) as Arc<dyn ChannelControl>);
        info!("channel loaded");
        Ok(channel)
    }

    /// Close the channel's sessions, stop it and release its adaptor
    #[instrument(name = "manager_unload_channel", skip(self))]
    pub fn unload_channel(&self, name: &str) -> Result<()> {
        let channel = self
            .channels
            .write()
            .remove(name)
            .ok_or_else(|| SensorError::ChannelNotFound { name: name.to_string() })?;
        let closed: Vec<SessionId> = {
            let mut sessions = self.sessions.lock();
            let ids: Vec<SessionId> = sessions
                .iter()
                .filter(|(_, ch)| ch.as_str() == name)
                .map(|(id, _)| *id)
                .collect();
            for id in &ids {
                sessions.remove(id);
            }
            self.record_session_count(sessions.len());
            ids
        };
        for session in closed {
            channel.remove_session(session);
        }
        channel.shutdown();
        self.release_device_adaptor(channel.adaptor_name())?;
        info!("channel unloaded");
        Ok(())
    }

    pub fn channel(&self, name: &str) -> Option<Arc<dyn ChannelControl>> {
        self.channels.read().get(name).cloned()
    }

    pub fn channel_infos(&self) -> Vec<ChannelInfo> {
        self.channels.read().values().map(|c| c.info()).collect()
    }

    /// Allocate a session on a loaded channel
    pub fn open_session(&self, channel: &str) -> Result<SessionId> {
        let name = self
            .channels
            .read()
            .get_key_value(channel)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| SensorError::ChannelNotFound { name: channel.to_string() })?;
        let session = SessionId(self.next_session.fetch_add(1, Ordering::SeqCst));
        let mut sessions = self.sessions.lock();
        sessions.insert(session, name);
        self.record_session_count(sessions.len());
        info!(%session, channel, "session opened");
        Ok(session)
    }

    /// Stop the session and withdraw all of its requests
    pub fn close_session(&self, session: SessionId) -> Result<()> {
        let channel = self.channel_for(session)?;
        {
            let mut sessions = self.sessions.lock();
            sessions.remove(&session);
            self.record_session_count(sessions.len());
        }
        channel.remove_session(session);
        info!(%session, channel = %channel.name(), "session closed");
        Ok(())
    }

    pub fn session_channel(&self, session: SessionId) -> Option<SensorName> {
        self.sessions.lock().get(&session).cloned()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn start(&self, session: SessionId) -> Result<bool> {
        Ok(self.channel_for(session)?.start(session))
    }

    pub fn stop(&self, session: SessionId) -> Result<bool> {
        Ok(self.channel_for(session)?.stop(session))
    }

    pub fn set_interval(&self, session: SessionId, interval_ms: u32) -> Result<bool> {
        Ok(self.channel_for(session)?.set_interval(session, interval_ms))
    }

    pub fn set_standby_override(&self, session: SessionId, value: bool) -> Result<bool> {
        Ok(self.channel_for(session)?.set_standby_override(session, value))
    }

    pub fn request_data_range(&self, session: SessionId, range: DataRange) -> Result<bool> {
        Ok(self.channel_for(session)?.request_data_range(session, range))
    }

    /// Display off puts every adaptor into standby; display on resumes them
    #[instrument(name = "manager_set_display_state", skip(self))]
    pub fn set_display_state(&self, on: bool) {
        if self.display_on.swap(on, Ordering::SeqCst) == on {
            return;
        }
        let adaptors: Vec<Arc<dyn DeviceAdaptor>> = self
            .adaptors
            .lock()
            .values()
            .map(|slot| Arc::clone(&slot.adaptor))
            .collect();
        for adaptor in adaptors {
            if on {
                adaptor.resume();
            } else {
                adaptor.standby();
            }
        }
        info!(display_on = on, "display state changed");
    }

    pub fn display_on(&self) -> bool {
        self.display_on.load(Ordering::SeqCst)
    }

    /// Unload every channel
    pub fn shutdown(&self) {
        let names: Vec<SensorName> = self.channels.read().keys().cloned().collect();
        for name in names {
            if let Err(e) = self.unload_channel(&name) {
                warn!(channel = %name, error = %e, "failed to unload channel");
            }
        }
    }

    fn channel_for(&self, session: SessionId) -> Result<Arc<dyn ChannelControl>> {
        let name = self
            .session_channel(session)
            .ok_or(SensorError::UnknownSession(session))?;
        self.channel(&name)
            .ok_or_else(|| SensorError::ChannelNotFound { name: name.to_string() })
    }

    fn record_session_count(&self, count: usize) {
        gauge!("sensord_active_sessions").set(count as f64);
    }
}
