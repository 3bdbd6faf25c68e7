//! Per-type adaptors over the platform HAL
//!
//! Every adaptor converts the HAL's SI units into the integer units the
//! channels publish and writes them into a single-slot buffer.

#[macro_use]
mod macros;

mod environment;
mod generic;
mod heading;
mod motion;
mod stepcounter;

pub use environment::{HybrisAlsAdaptor, HybrisPressureAdaptor, HybrisProximityAdaptor};
pub use generic::{ConversionContext, HybrisAdaptor, HybrisSensorProfile};
pub use heading::{HybrisOrientationAdaptor, HybrisRotationAdaptor};
pub use motion::{HybrisAccelerometerAdaptor, HybrisGyroscopeAdaptor, HybrisMagnetometerAdaptor};
pub use stepcounter::HybrisStepCounterAdaptor;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use adaptor_core::DeviceAdaptor;
    use contracts::{HalEvent, HalSensorType, SensorHal, SensorInfo, SensorSettings, SessionId};

    use crate::manager::{HybrisManager, ManagerSettings};
    use crate::mock::{typical_sensor_list, HalCall, MockHal, MockHalConfig};
    use crate::wakelock::WakeLock;

    fn connected(hal: &Arc<MockHal>) -> Arc<HybrisManager> {
        HybrisManager::with_hal(
            Arc::clone(hal) as Arc<dyn SensorHal>,
            ManagerSettings::default(),
            WakeLock::disabled(),
        )
        .unwrap()
    }

    #[test]
    fn test_missing_sensor_marks_adaptor_invalid() {
        let hal = Arc::new(MockHal::new(vec![SensorInfo::new(1, HalSensorType::Accelerometer, "acc")]));
        let manager = connected(&hal);
        let gyro = HybrisGyroscopeAdaptor::new("gyroscopeadaptor", Arc::clone(&manager), &SensorSettings::default());
        assert!(!gyro.is_valid());
        assert!(!gyro.start_sensor());
        assert_eq!(manager.registered_adaptors(), 0);
    }

    #[test]
    fn test_description_and_intervals() {
        let hal = Arc::new(MockHal::typical_device());
        let manager = connected(&hal);
        let gyro = HybrisGyroscopeAdaptor::new("gyroscopeadaptor", manager, &SensorSettings::default());
        let core = gyro.core();
        assert_eq!(core.description(), "Hybris gyroscope");
        assert_eq!(
            core.adapted_sensor("gyroscope").unwrap().description(),
            "Internal gyroscope coordinates"
        );
        assert_eq!(core.available_intervals()[0].min, 5.0);
        assert_eq!(core.available_intervals()[0].max, 200.0);
        assert_eq!(core.default_interval(), 50);
    }

    #[test]
    fn test_configured_default_interval_wins() {
        let hal = Arc::new(MockHal::typical_device());
        let manager = connected(&hal);
        let settings = SensorSettings {
            default_interval: Some(100),
            ..SensorSettings::default()
        };
        let acc = HybrisAccelerometerAdaptor::new("accelerometeradaptor", Arc::clone(&manager), &settings);
        assert_eq!(acc.core().default_interval(), 100);
        let pressure = HybrisPressureAdaptor::new("pressureadaptor", manager, &SensorSettings::default());
        // Falls back to the initial delay programmed at attach
        assert_eq!(pressure.core().default_interval(), 200);
    }

    #[test]
    fn test_start_activates_and_stop_deactivates() {
        let hal = Arc::new(MockHal::typical_device());
        let manager = connected(&hal);
        let acc = HybrisAccelerometerAdaptor::new("accelerometeradaptor", manager, &SensorSettings::default());
        hal.clear_calls();

        assert!(acc.start_sensor());
        assert!(hal.is_active(1));
        acc.stop_sensor();
        assert!(!hal.is_active(1));
        assert_eq!(
            hal.calls()
                .iter()
                .filter(|c| matches!(c, HalCall::Activate { handle: 1, .. }))
                .count(),
            2
        );
    }

    #[test]
    fn test_power_state_follows_hardware() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enable");
        std::fs::write(&path, "").unwrap();
        let hal = Arc::new(MockHal::typical_device());
        let manager = connected(&hal);
        let settings = SensorSettings {
            powerstate_path: Some(path.clone()),
            ..SensorSettings::default()
        };
        let steps = HybrisStepCounterAdaptor::new("stepcounteradaptor", manager, &settings);

        steps.start_sensor();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1");
        steps.stop_sensor();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0");
    }

    #[test]
    fn test_fallback_sample_is_delivered_once() {
        let hal = Arc::new(MockHal::typical_device());
        let manager = connected(&hal);
        let als = HybrisAlsAdaptor::new("alsadaptor", manager, &SensorSettings::default());
        let mut reader = als.buffer().reader();

        als.start_sensor();
        assert_eq!(reader.read().iter().map(|d| d.value).collect::<Vec<_>>(), vec![400]);

        als.set_interval(100, SessionId(1));
        assert!(reader.read().is_empty());
    }

    #[test]
    fn test_fallback_waits_for_hardware_start() {
        let hal = Arc::new(MockHal::typical_device());
        let manager = connected(&hal);
        let als = HybrisAlsAdaptor::new("alsadaptor", manager, &SensorSettings::default());

        assert!(als.set_interval(100, SessionId(1)));
        assert_eq!(als.buffer().committed_count(), 0);

        let mut reader = als.buffer().reader();
        als.start_sensor();
        assert_eq!(reader.read().iter().map(|d| d.value).collect::<Vec<_>>(), vec![400]);
    }

    #[test]
    fn test_real_sample_suppresses_fallback() {
        let hal = Arc::new(MockHal::typical_device());
        let manager = connected(&hal);
        let proximity = HybrisProximityAdaptor::new("proximityadaptor", Arc::clone(&manager), &SensorSettings::default());
        let mut reader = proximity.buffer().reader();

        proximity.start_sensor();
        // Sensor range 5 is the "far" fallback
        let first = reader.read();
        assert_eq!(first.len(), 1);
        assert!(!first[0].within_proximity);

        manager.process_events(&[HalEvent::new(7, HalSensorType::Proximity, 1_000).with_values(&[0.0])]);
        let second = reader.read();
        assert_eq!(second.len(), 1);
        assert!(second[0].within_proximity);

        proximity.stop_sensor();
        proximity.start_sensor();
        assert!(reader.read().is_empty());
    }

    #[test]
    fn test_interval_is_clamped_and_skips_unchanged() {
        let hal = Arc::new(MockHal::typical_device());
        let manager = connected(&hal);
        let gyro = HybrisGyroscopeAdaptor::new("gyroscopeadaptor", manager, &SensorSettings::default());
        gyro.start_sensor();
        hal.clear_calls();

        assert!(gyro.set_interval(1, SessionId(1)));
        assert_eq!(gyro.interval(), 5);
        assert_eq!(hal.calls(), vec![HalCall::SetDelay { handle: 5, delay_ns: 5_000_000 }]);

        hal.clear_calls();
        assert!(gyro.set_interval(2, SessionId(2)));
        assert!(hal.calls().is_empty());

        gyro.remove_session(SessionId(1));
        gyro.remove_session(SessionId(2));
        assert_eq!(gyro.interval(), 50);
    }

    #[test]
    fn test_failed_activation_invalidates_adaptor() {
        let config = MockHalConfig {
            fail_activate: vec![8],
            ..MockHalConfig::default()
        };
        let hal = Arc::new(MockHal::with_config(typical_sensor_list(), config));
        let manager = connected(&hal);
        let pressure = HybrisPressureAdaptor::new("pressureadaptor", manager, &SensorSettings::default());
        assert!(pressure.is_valid());
        pressure.start_sensor();
        assert!(!pressure.is_running());
        assert!(!pressure.is_valid());
    }

    #[test]
    fn test_reader_thread_feeds_running_adaptor() {
        let hal = Arc::new(MockHal::typical_device());
        let manager = connected(&hal);
        let steps = HybrisStepCounterAdaptor::new("stepcounteradaptor", Arc::clone(&manager), &SensorSettings::default());
        let mut reader = steps.buffer().reader();

        manager.start_reader_thread().unwrap();
        // Not running yet: dropped
        hal.inject([HalEvent::new(10, HalSensorType::StepCounter, 1_000).with_step_counter(3)]);
        std::thread::sleep(Duration::from_millis(100));
        assert!(reader.read().is_empty());

        steps.start_sensor();
        hal.inject([HalEvent::new(10, HalSensorType::StepCounter, 2_000).with_step_counter(4)]);
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while !reader.has_unread() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(reader.read().iter().map(|d| d.value).collect::<Vec<_>>(), vec![4]);
        manager.shutdown().unwrap();
        assert!(!hal.is_active(10));
    }

    #[test]
    fn test_reattach_reactivates_running_adaptor() {
        let hal = Arc::new(MockHal::typical_device());
        let manager = connected(&hal);
        let acc = HybrisAccelerometerAdaptor::new("accelerometeradaptor", Arc::clone(&manager), &SensorSettings::default());
        acc.start_sensor();
        acc.set_interval(20, SessionId(1));

        manager.detach();
        manager.attach(Arc::clone(&hal) as Arc<dyn SensorHal>).unwrap();
        assert!(hal.is_active(1));
        assert_eq!(manager.delay(1), Some(20));
    }
}
