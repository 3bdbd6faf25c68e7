//! HAL adaptor macro
//!
//! Each sensor type gets its own named adaptor type wrapping
//! [`HybrisAdaptor`](super::HybrisAdaptor); this macro writes the wrapper,
//! the registering constructor and the delegating trait impls.

/// Define a named HAL adaptor
///
/// # Usage
/// ```ignore
/// define_hybris_adaptor!(
///     /// Gyroscope over the platform HAL
///     HybrisGyroscopeAdaptor,   // Adaptor type
///     TimedXyzData,             // Record written to the buffer
///     GYROSCOPE                 // HybrisSensorProfile constant
/// );
/// ```
macro_rules! define_hybris_adaptor {
    (
        $(#[$meta:meta])*
        $adaptor_name:ident,
        $record:ty,
        $profile:expr
    ) => {
        $(#[$meta])*
        pub struct $adaptor_name {
            inner: $crate::adaptors::HybrisAdaptor<$record>,
        }

        impl $adaptor_name {
            /// Build the adaptor and, when the platform has the sensor,
            /// register it for sample delivery
            pub fn new(
                name: &str,
                manager: std::sync::Arc<$crate::manager::HybrisManager>,
                settings: &contracts::SensorSettings,
            ) -> std::sync::Arc<Self> {
                let inner = $crate::adaptors::HybrisAdaptor::new(
                    name,
                    std::sync::Arc::clone(&manager),
                    settings,
                    $profile,
                );
                let adaptor = std::sync::Arc::new(Self { inner });
                if adaptor_core::DeviceAdaptor::is_valid(adaptor.as_ref()) {
                    let weak = std::sync::Arc::downgrade(&adaptor);
                    manager.register_adaptor(weak as std::sync::Weak<dyn $crate::manager::HalSampleSink>);
                }
                adaptor
            }

            pub fn buffer(&self) -> &std::sync::Arc<adaptor_core::RingBuffer<$record>> {
                self.inner.buffer()
            }
        }

        impl adaptor_core::DeviceAdaptor for $adaptor_name {
            fn core(&self) -> &adaptor_core::AdaptorCore {
                adaptor_core::DeviceAdaptor::core(&self.inner)
            }

            fn start_hardware(&self) -> bool {
                adaptor_core::DeviceAdaptor::start_hardware(&self.inner)
            }

            fn stop_hardware(&self) {
                adaptor_core::DeviceAdaptor::stop_hardware(&self.inner)
            }

            fn apply_interval(&self, interval_ms: u32, winner: Option<contracts::SessionId>) -> bool {
                adaptor_core::DeviceAdaptor::apply_interval(&self.inner, interval_ms, winner)
            }

            fn interval(&self) -> u32 {
                adaptor_core::DeviceAdaptor::interval(&self.inner)
            }
        }

        impl $crate::manager::HalSampleSink for $adaptor_name {
            fn sink_name(&self) -> &str {
                adaptor_core::DeviceAdaptor::core(&self.inner).name().as_str()
            }

            fn sensor_type(&self) -> contracts::HalSensorType {
                self.inner.sensor_type()
            }

            fn is_hardware_running(&self) -> bool {
                adaptor_core::DeviceAdaptor::core(&self.inner).is_running()
            }

            fn process_sample(&self, event: &contracts::HalEvent) {
                self.inner.process_sample(event)
            }

            fn reattach(&self) {
                self.inner.reattach()
            }
        }
    };
}
