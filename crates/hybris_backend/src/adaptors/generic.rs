//! Shared implementation behind every HAL-backed adaptor
//!
//! The per-type modules only describe the platform type, the output and the
//! unit conversion; lifecycle, interval programming and fallback injection
//! live here.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use adaptor_core::{AdaptorCore, DeviceAdaptor, PowerStateFile, RingBuffer};
use contracts::{DataRange, HalEvent, HalSensorType, SensorRecord, SensorSettings, SessionId};
use metrics::counter;
use tracing::{debug, info, warn};

use crate::manager::HybrisManager;

/// Per-connection facts a conversion may need
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversionContext {
    pub max_range: f32,
    pub resolution: f32,
}

/// Static description of one HAL sensor type
pub struct HybrisSensorProfile<T> {
    pub sensor_type: HalSensorType,
    /// Adapted sensor name channels attach to
    pub output: &'static str,
    pub output_description: &'static str,
    pub description: &'static str,
    /// Used when the config has no `default_interval`
    pub default_interval: Option<u32>,
    pub data_range: fn(&ConversionContext) -> DataRange,
    pub convert: fn(&HalEvent, &ConversionContext) -> T,
}

/// Adaptor for one platform sensor type
pub struct HybrisAdaptor<T: SensorRecord> {
    core: AdaptorCore,
    manager: Arc<HybrisManager>,
    profile: HybrisSensorProfile<T>,
    buffer: Arc<RingBuffer<T>>,
    power: PowerStateFile,
    context: ConversionContext,
    interval: AtomicU32,
}

impl<T: SensorRecord> HybrisAdaptor<T> {
    /// Look up the handle for the platform type and describe the adaptor.
    ///
    /// Without a matching platform sensor the adaptor is marked invalid.
    pub fn new(
        name: &str,
        manager: Arc<HybrisManager>,
        settings: &SensorSettings,
        profile: HybrisSensorProfile<T>,
    ) -> Self {
        let core = AdaptorCore::new(name);
        let buffer = Arc::new(RingBuffer::new(1));
        core.set_adapted_sensor(profile.output, profile.output_description, Arc::clone(&buffer));
        core.set_description(profile.description);

        let mut context = ConversionContext::default();
        match manager.handle_for_type(profile.sensor_type) {
            Some(handle) => {
                context.max_range = manager.max_range(handle);
                context.resolution = manager.resolution(handle);
                core.introduce_available_data_range((profile.data_range)(&context));
                core.introduce_available_interval(DataRange::new(
                    f64::from(manager.min_delay(handle)),
                    f64::from(manager.max_delay(handle)),
                    0.0,
                ));
                let default_interval = settings
                    .default_interval
                    .or(profile.default_interval)
                    .or_else(|| manager.delay(handle).map(|d| d.max(0) as u32))
                    .unwrap_or(0);
                core.set_default_interval(default_interval);
                info!(adaptor = name, handle, default_interval, "hal sensor found");
            }
            None => {
                warn!(adaptor = name, sensor_type = ?profile.sensor_type, "no hal sensor of this type");
                core.set_valid(false);
            }
        }

        let power = PowerStateFile::new(name, settings.powerstate_path.clone());
        Self {
            core,
            manager,
            profile,
            buffer,
            power,
            context,
            interval: AtomicU32::new(0),
        }
    }

    pub fn buffer(&self) -> &Arc<RingBuffer<T>> {
        &self.buffer
    }

    pub fn manager(&self) -> &Arc<HybrisManager> {
        &self.manager
    }

    pub fn sensor_type(&self) -> HalSensorType {
        self.profile.sensor_type
    }

    fn handle(&self) -> Option<i32> {
        self.manager.handle_for_type(self.profile.sensor_type)
    }

    /// Deliver the pending fallback sample, if real data never arrived
    fn inject_fallback(&self, handle: i32) {
        if let Some(event) = self.manager.take_fallback(handle, self.profile.sensor_type) {
            debug!(adaptor = %self.core.name(), handle, "injecting fallback sample");
            self.process_sample(&event);
        }
    }

    pub fn process_sample(&self, event: &HalEvent) {
        let mut slot = self.buffer.next_slot();
        *slot = (self.profile.convert)(event, &self.context);
        slot.commit();
        self.buffer.wake_up_readers();
        counter!("sensord_samples_total", "adaptor" => self.core.name().to_string()).increment(1);
    }

    /// Re-activate after the sensor service came back
    pub fn reattach(&self) {
        let Some(handle) = self.handle() else {
            warn!(adaptor = %self.core.name(), "sensor missing after reconnect");
            return;
        };
        if !self.manager.set_active(handle, true) {
            warn!(adaptor = %self.core.name(), handle, "re-activation failed");
        }
        self.reevaluate_interval();
    }
}

impl<T: SensorRecord> DeviceAdaptor for HybrisAdaptor<T> {
    fn core(&self) -> &AdaptorCore {
        &self.core
    }

    fn start_hardware(&self) -> bool {
        let Some(handle) = self.handle() else {
            return false;
        };
        if !self.manager.set_active(handle, true) {
            warn!(adaptor = %self.core.name(), handle, "activation failed, marking invalid");
            self.core.set_valid(false);
            return false;
        }
        self.power.set(true);
        self.inject_fallback(handle);
        true
    }

    fn stop_hardware(&self) {
        if let Some(handle) = self.handle() {
            self.manager.set_active(handle, false);
        }
        self.power.set(false);
    }

    fn apply_interval(&self, interval_ms: u32, winner: Option<SessionId>) -> bool {
        let Some(handle) = self.handle() else {
            return false;
        };
        let clamped = self
            .core
            .available_intervals()
            .first()
            .map_or(interval_ms, |range| range.clamp_interval(interval_ms));
        debug!(
            adaptor = %self.core.name(),
            handle,
            interval_ms = clamped,
            session = winner.map_or(SessionId::SENTINEL, SessionId::get),
            "programming hal delay"
        );
        if !self.manager.set_delay(handle, clamped as i32, false) {
            return false;
        }
        self.interval.store(clamped, Ordering::SeqCst);
        // Stays owed until hardware starts when nothing is running yet
        if self.core.is_running() {
            self.inject_fallback(handle);
        }
        true
    }

    fn interval(&self) -> u32 {
        self.interval.load(Ordering::SeqCst)
    }
}
