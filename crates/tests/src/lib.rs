//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - Config fragments through to adaptor settings
//! - Mock HAL -> hybris adaptor -> channel -> session receiver
//! - Initial fallback value when the interval is set before start
//! - Binder service death and reconnect with running sessions
//! - Display standby and per-session standby override
//! - Kernel adaptors served through the manager

#[cfg(test)]
mod support {
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::SensorHal;
    use hybris_backend::{HybrisManager, ManagerSettings, MockHal, WakeLock};
    use tokio::sync::mpsc;

    pub fn mock_platform() -> (Arc<MockHal>, Arc<HybrisManager>) {
        let hal = Arc::new(MockHal::typical_device());
        let manager = HybrisManager::with_hal(
            Arc::clone(&hal) as Arc<dyn SensorHal>,
            ManagerSettings::default(),
            WakeLock::disabled(),
        )
        .unwrap();
        (hal, manager)
    }

    pub async fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        for _ in 0..400 {
            if cond() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    pub async fn recv<T>(rx: &mut mpsc::Receiver<T>) -> T {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for sample")
            .expect("channel closed")
    }
}

#[cfg(test)]
mod config_tests {
    use contracts::AdaptorKind;
    use config_loader::ConfigLoader;
    use std::fs;

    #[test]
    fn test_fragments_reach_sensor_settings() {
        let dir = tempfile::tempdir().unwrap();
        let conf_d = dir.path().join("sensord.d");
        fs::create_dir(&conf_d).unwrap();
        fs::write(
            conf_d.join("10-device.toml"),
            "[adaptors]\nproximityadaptor = \"sysfs-proximity\"\n\n[sensors.proximity]\nthreshold = 30\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("sensord.toml"),
            "[sensors.proximity]\ndevice_path = \"/sys/bus/i2c/prox\"\n",
        )
        .unwrap();

        let config = ConfigLoader::load_with_conf_dir(&dir.path().join("sensord.toml"), Some(&conf_d)).unwrap();
        assert_eq!(config.adaptors["proximityadaptor"], AdaptorKind::SysfsProximity);
        let settings = config.sensor("proximity");
        assert_eq!(settings.threshold, Some(30));
        assert_eq!(settings.device_path.unwrap().to_str(), Some("/sys/bus/i2c/prox"));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;

    use adaptor_core::DeviceAdaptor;
    use contracts::{HalEvent, HalSensorType, SensorSettings, TimedUnsigned, TimedXyzData};
    use hybris_backend::{HybrisAccelerometerAdaptor, HybrisAlsAdaptor, HybrisStepCounterAdaptor};
    use sensor_channels::SensorManager;

    use crate::support::{mock_platform, recv, wait_for};

    /// Mock HAL -> reader thread -> hybris adaptor -> channel -> two sessions
    #[tokio::test]
    async fn test_e2e_mock_hal_to_sessions() {
        let (hal, hybris) = mock_platform();
        hybris.start_reader_thread().unwrap();
        let manager = SensorManager::new();
        manager.register_adaptor(HybrisStepCounterAdaptor::new(
            "stepcounteradaptor",
            Arc::clone(&hybris),
            &SensorSettings::default(),
        ));
        let channel = manager
            .load_channel::<TimedUnsigned>("stepcountersensor", "stepcounteradaptor", None)
            .unwrap();

        let first = manager.open_session("stepcountersensor").unwrap();
        let second = manager.open_session("stepcountersensor").unwrap();
        let mut rx_first = channel.subscribe_default(first);
        let mut rx_second = channel.subscribe_default(second);
        assert!(manager.start(first).unwrap());
        assert!(manager.start(second).unwrap());
        assert!(hal.is_active(10));

        hal.inject([HalEvent::new(10, HalSensorType::StepCounter, 3_000_000).with_step_counter(42)]);
        let a = recv(&mut rx_first).await;
        let b = recv(&mut rx_second).await;
        assert_eq!((a.value, a.timestamp), (42, 3_000));
        assert_eq!(b, a);

        // Unchanged value is suppressed, a change goes through
        hal.inject([
            HalEvent::new(10, HalSensorType::StepCounter, 4_000_000).with_step_counter(42),
            HalEvent::new(10, HalSensorType::StepCounter, 5_000_000).with_step_counter(43),
        ]);
        assert_eq!(recv(&mut rx_first).await.value, 43);

        manager.close_session(first).unwrap();
        assert!(hal.is_active(10));
        manager.close_session(second).unwrap();
        assert!(!hal.is_active(10));

        manager.shutdown();
        hybris.shutdown().unwrap();
    }

    /// Two sessions ask for 50 ms and 20 ms; the faster one is programmed
    #[tokio::test]
    async fn test_interval_arbitration_reaches_hal() {
        let (_hal, hybris) = mock_platform();
        let manager = SensorManager::new();
        manager.register_adaptor(HybrisAccelerometerAdaptor::new(
            "accelerometeradaptor",
            Arc::clone(&hybris),
            &SensorSettings::default(),
        ));
        manager
            .load_channel::<TimedXyzData>("accelerometersensor", "accelerometeradaptor", None)
            .unwrap();

        let slow = manager.open_session("accelerometersensor").unwrap();
        let fast = manager.open_session("accelerometersensor").unwrap();
        manager.start(slow).unwrap();
        manager.start(fast).unwrap();
        manager.set_interval(slow, 50).unwrap();
        manager.set_interval(fast, 20).unwrap();
        assert_eq!(hybris.delay(1), Some(20));

        manager.close_session(fast).unwrap();
        assert_eq!(hybris.delay(1), Some(50));
        let adaptor = manager.adaptor("accelerometeradaptor").unwrap();
        assert_eq!(adaptor.interval(), 50);

        manager.shutdown();
        hybris.shutdown().unwrap();
    }

    /// An interval requested before the session starts must not use up the
    /// initial value
    #[tokio::test]
    async fn test_interval_before_start_keeps_initial_value() {
        let (hal, hybris) = mock_platform();
        let manager = SensorManager::new();
        manager.register_adaptor(HybrisAlsAdaptor::new("alsadaptor", Arc::clone(&hybris), &SensorSettings::default()));
        let channel = manager.load_channel::<TimedUnsigned>("alssensor", "alsadaptor", None).unwrap();
        let session = manager.open_session("alssensor").unwrap();
        let mut rx = channel.subscribe_default(session);

        assert!(manager.set_interval(session, 100).unwrap());
        assert!(!hal.is_active(6));
        assert!(rx.try_recv().is_err());

        manager.start(session).unwrap();
        assert_eq!(recv(&mut rx).await.value, 400);
        assert!(hal.is_active(6));

        manager.shutdown();
        hybris.shutdown().unwrap();
    }

    /// Display off stops hardware unless a session asked to stay awake
    #[tokio::test]
    async fn test_display_standby_and_override() {
        let (hal, hybris) = mock_platform();
        let manager = SensorManager::new();
        manager.register_adaptor(HybrisAlsAdaptor::new("alsadaptor", Arc::clone(&hybris), &SensorSettings::default()));
        let channel = manager.load_channel::<TimedUnsigned>("alssensor", "alsadaptor", None).unwrap();
        let session = manager.open_session("alssensor").unwrap();
        let mut rx = channel.subscribe_default(session);
        manager.start(session).unwrap();
        // Fallback value injected on activation
        assert_eq!(recv(&mut rx).await.value, 400);
        assert!(hal.is_active(6));

        manager.set_display_state(false);
        assert!(!hal.is_active(6));
        manager.set_display_state(true);
        assert!(hal.is_active(6));

        manager.set_standby_override(session, true).unwrap();
        manager.set_display_state(false);
        assert!(hal.is_active(6));
        manager.set_standby_override(session, false).unwrap();
        assert!(!hal.is_active(6));

        manager.set_display_state(true);
        assert!(wait_for(|| hal.is_active(6)).await);
        manager.shutdown();
        hybris.shutdown().unwrap();
    }
}

#[cfg(test)]
mod binder_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{HalEvent, HalSensorType, SensorSettings, TimedUnsigned};
    use hybris_backend::binder::{BinderEventLoop, BinderLoopSettings, LoopbackConnector, LoopbackService};
    use hybris_backend::{HybrisAlsAdaptor, HybrisManager, ManagerSettings, MockHal, WakeLock};
    use sensor_channels::SensorManager;
    use tokio::sync::watch;

    use crate::support::{recv, wait_for};

    /// Service death while a session is running: the loop reconnects, the
    /// sensor is re-activated and samples keep flowing to the same session
    #[tokio::test]
    async fn test_session_survives_service_restart() {
        let hal = Arc::new(MockHal::typical_device());
        let service = LoopbackService::new(Arc::clone(&hal));
        let hybris = Arc::new(HybrisManager::new(ManagerSettings::default(), WakeLock::disabled()));
        let event_loop = BinderEventLoop::new(
            LoopbackConnector::new(Arc::clone(&service)),
            Arc::clone(&hybris),
            BinderLoopSettings {
                reconnect_delay: Duration::from_millis(10),
                ..BinderLoopSettings::default()
            },
        );
        let client = event_loop.connect().await.unwrap();
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(async move { event_loop.run(client, stop_rx).await });

        let manager = SensorManager::new();
        manager.register_adaptor(HybrisAlsAdaptor::new("alsadaptor", Arc::clone(&hybris), &SensorSettings::default()));
        let channel = manager.load_channel::<TimedUnsigned>("alssensor", "alsadaptor", None).unwrap();
        let session = manager.open_session("alssensor").unwrap();
        let mut rx = channel.subscribe_default(session);
        manager.start(session).unwrap();
        assert_eq!(recv(&mut rx).await.value, 400);

        hal.inject([HalEvent::new(6, HalSensorType::Light, 1_000).with_values(&[150.0])]);
        assert_eq!(recv(&mut rx).await.value, 150);

        service.kill();
        assert!(wait_for(|| !hybris.is_connected()).await);
        service.revive();
        assert!(wait_for(|| hybris.is_connected() && hybris.is_active(6)).await);

        // The rebuilt table owes one fallback sample before real data
        assert_eq!(recv(&mut rx).await.value, 400);
        hal.inject([HalEvent::new(6, HalSensorType::Light, 2_000).with_values(&[175.0])]);
        assert_eq!(recv(&mut rx).await.value, 175);

        manager.shutdown();
        stop_tx.send(true).unwrap();
        task.await.unwrap().unwrap();
        hybris.shutdown().unwrap();
    }
}

#[cfg(test)]
mod kernel_tests {
    use std::fs;

    use contracts::{ProximityData, SensorSettings};
    use kernel_adaptors::ProximityAsciiAdaptor;
    use sensor_channels::SensorManager;

    use crate::support::recv;

    /// ASCII proximity attribute polled on an interval, served to a session
    #[tokio::test]
    async fn test_ascii_proximity_through_manager() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proximity");
        fs::write(&path, "5\n").unwrap();
        let settings = SensorSettings {
            device_path: Some(path.clone()),
            threshold: Some(30),
            default_interval: Some(10),
            ..SensorSettings::default()
        };

        let manager = SensorManager::new();
        manager.register_adaptor(ProximityAsciiAdaptor::ascii("proximityadaptor", &settings));
        let channel = manager
            .load_channel::<ProximityData>("proximitysensor", "proximityadaptor", None)
            .unwrap();
        let session = manager.open_session("proximitysensor").unwrap();
        let mut rx = channel.subscribe_default(session);
        manager.start(session).unwrap();

        let far = recv(&mut rx).await;
        assert_eq!(far.value, 5);
        assert!(!far.within_proximity);

        fs::write(&path, "64\n").unwrap();
        let near = recv(&mut rx).await;
        assert_eq!(near.value, 64);
        assert!(near.within_proximity);

        manager.close_session(session).unwrap();
        manager.shutdown();
    }

    #[test]
    fn test_missing_attribute_cannot_be_requested() {
        let settings = SensorSettings {
            device_path: Some("/nonexistent/proximity".into()),
            ..SensorSettings::default()
        };
        let manager = SensorManager::new();
        manager.register_adaptor(ProximityAsciiAdaptor::ascii("proximityadaptor", &settings));
        assert!(manager.request_device_adaptor("proximityadaptor").is_err());
        assert_eq!(manager.adaptor_reference_count("proximityadaptor"), 0);
    }
}
