//! Adaptor construction and default channels per configured kind

use std::sync::Arc;

use adaptor_core::DeviceAdaptor;
use contracts::{
    AdaptorKind, CalibratedMagneticFieldData, CompassData, DaemonConfig, LidData, ProximityData, SensorName,
    SensorRecord, TimedUnsigned, TimedXyzData,
};
use hybris_backend::{
    HybrisAccelerometerAdaptor, HybrisAlsAdaptor, HybrisGyroscopeAdaptor, HybrisMagnetometerAdaptor, HybrisManager,
    HybrisOrientationAdaptor, HybrisPressureAdaptor, HybrisProximityAdaptor, HybrisRotationAdaptor,
    HybrisStepCounterAdaptor,
};
use kernel_adaptors::{
    AbsValueInterpreter, AbsValueKind, IioAdaptor, IioDeviceKind, InputDevAdaptor, LidInterpreter,
    ProximityAsciiAdaptor,
};
use sensor_channels::{SensorChannel, SensorManager};

use crate::error::{CliError, Result};

/// Build the adaptor `name` of the given kind.
///
/// Settings come from the `[sensors.<group>]` section, where the group is
/// the adaptor name without its `adaptor` suffix.
pub fn build_adaptor(
    name: &str,
    kind: AdaptorKind,
    config: &DaemonConfig,
    hybris: Option<&Arc<HybrisManager>>,
) -> Result<Arc<dyn DeviceAdaptor>> {
    let settings = config.sensor(SensorName::new(name).config_group());
    let platform = || {
        hybris
            .cloned()
            .ok_or_else(|| CliError::backend_unavailable(name, kind))
    };

    let adaptor: Arc<dyn DeviceAdaptor> = match kind {
        AdaptorKind::HybrisAccelerometer => HybrisAccelerometerAdaptor::new(name, platform()?, &settings),
        AdaptorKind::HybrisGyroscope => HybrisGyroscopeAdaptor::new(name, platform()?, &settings),
        AdaptorKind::HybrisMagnetometer => HybrisMagnetometerAdaptor::new(name, platform()?, &settings),
        AdaptorKind::HybrisPressure => HybrisPressureAdaptor::new(name, platform()?, &settings),
        AdaptorKind::HybrisProximity => HybrisProximityAdaptor::new(name, platform()?, &settings),
        AdaptorKind::HybrisAls => HybrisAlsAdaptor::new(name, platform()?, &settings),
        AdaptorKind::HybrisOrientation => HybrisOrientationAdaptor::new(name, platform()?, &settings),
        AdaptorKind::HybrisRotation => HybrisRotationAdaptor::new(name, platform()?, &settings),
        AdaptorKind::HybrisStepcounter => HybrisStepCounterAdaptor::new(name, platform()?, &settings),
        AdaptorKind::IioAccelerometer => IioAdaptor::iio(IioDeviceKind::Accelerometer, name, &settings),
        AdaptorKind::IioGyroscope => IioAdaptor::iio(IioDeviceKind::Gyroscope, name, &settings),
        AdaptorKind::IioMagnetometer => IioAdaptor::iio(IioDeviceKind::Magnetometer, name, &settings),
        AdaptorKind::IioAls => IioAdaptor::iio(IioDeviceKind::Light, name, &settings),
        AdaptorKind::EvdevHumidity => {
            InputDevAdaptor::<AbsValueInterpreter>::abs_value(AbsValueKind::Humidity, name, &settings)
        }
        AdaptorKind::EvdevPressure => {
            InputDevAdaptor::<AbsValueInterpreter>::abs_value(AbsValueKind::Pressure, name, &settings)
        }
        AdaptorKind::EvdevTemperature => {
            InputDevAdaptor::<AbsValueInterpreter>::abs_value(AbsValueKind::Temperature, name, &settings)
        }
        AdaptorKind::EvdevLid => InputDevAdaptor::<LidInterpreter>::lid(name, &settings),
        AdaptorKind::SysfsProximity => ProximityAsciiAdaptor::ascii(name, &settings),
    };
    Ok(adaptor)
}

/// Name of the channel loaded for an adaptor: `alsadaptor` -> `alssensor`
pub fn default_channel_name(adaptor_name: &str) -> String {
    format!("{}sensor", SensorName::new(adaptor_name).config_group())
}

/// Record type carried by an adaptor kind's primary output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Xyz,
    MagneticField,
    Unsigned,
    Proximity,
    Compass,
    Lid,
}

impl From<AdaptorKind> for RecordKind {
    fn from(kind: AdaptorKind) -> Self {
        match kind {
            AdaptorKind::HybrisAccelerometer
            | AdaptorKind::HybrisGyroscope
            | AdaptorKind::IioAccelerometer
            | AdaptorKind::IioGyroscope => Self::Xyz,
            AdaptorKind::HybrisMagnetometer | AdaptorKind::IioMagnetometer => Self::MagneticField,
            AdaptorKind::HybrisPressure
            | AdaptorKind::HybrisAls
            | AdaptorKind::HybrisStepcounter
            | AdaptorKind::IioAls
            | AdaptorKind::EvdevHumidity
            | AdaptorKind::EvdevPressure
            | AdaptorKind::EvdevTemperature => Self::Unsigned,
            AdaptorKind::HybrisProximity | AdaptorKind::SysfsProximity => Self::Proximity,
            AdaptorKind::HybrisOrientation | AdaptorKind::HybrisRotation => Self::Compass,
            AdaptorKind::EvdevLid => Self::Lid,
        }
    }
}

/// Called with every typed channel right after it is loaded
pub trait ChannelVisitor {
    fn visit<T: SensorRecord>(&mut self, channel: &Arc<SensorChannel<T>>);
}

impl ChannelVisitor for () {
    fn visit<T: SensorRecord>(&mut self, _channel: &Arc<SensorChannel<T>>) {}
}

/// Load the default channel over `adaptor_name` and hand it to `visitor`
pub fn load_default_channel<V: ChannelVisitor>(
    manager: &SensorManager,
    adaptor_name: &str,
    kind: AdaptorKind,
    visitor: &mut V,
) -> Result<String> {
    let channel_name = default_channel_name(adaptor_name);
    match RecordKind::from(kind) {
        RecordKind::Xyz => load::<TimedXyzData, V>(manager, &channel_name, adaptor_name, visitor)?,
        RecordKind::MagneticField => {
            load::<CalibratedMagneticFieldData, V>(manager, &channel_name, adaptor_name, visitor)?
        }
        RecordKind::Unsigned => load::<TimedUnsigned, V>(manager, &channel_name, adaptor_name, visitor)?,
        RecordKind::Proximity => load::<ProximityData, V>(manager, &channel_name, adaptor_name, visitor)?,
        RecordKind::Compass => load::<CompassData, V>(manager, &channel_name, adaptor_name, visitor)?,
        RecordKind::Lid => load::<LidData, V>(manager, &channel_name, adaptor_name, visitor)?,
    }
    Ok(channel_name)
}

fn load<T: SensorRecord, V: ChannelVisitor>(
    manager: &SensorManager,
    channel_name: &str,
    adaptor_name: &str,
    visitor: &mut V,
) -> Result<()> {
    let channel = manager.load_channel::<T>(channel_name, adaptor_name, None)?;
    visitor.visit(&channel);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{BackendKind, DaemonSettings, SensorHal, SensorSettings};
    use hybris_backend::{ManagerSettings, MockHal, WakeLock};
    use std::collections::BTreeMap;

    fn config(adaptors: &[(&str, AdaptorKind)]) -> DaemonConfig {
        DaemonConfig {
            daemon: DaemonSettings {
                backend: BackendKind::Disabled,
                ..DaemonSettings::default()
            },
            adaptors: adaptors.iter().map(|(n, k)| (n.to_string(), *k)).collect(),
            sensors: BTreeMap::new(),
        }
    }

    #[test]
    fn test_default_channel_name() {
        assert_eq!(default_channel_name("alsadaptor"), "alssensor");
        assert_eq!(default_channel_name("lid"), "lidsensor");
    }

    #[test]
    fn test_hybris_kind_requires_backend() {
        let cfg = config(&[("alsadaptor", AdaptorKind::HybrisAls)]);
        let err = build_adaptor("alsadaptor", AdaptorKind::HybrisAls, &cfg, None).err().unwrap();
        assert!(matches!(err, CliError::BackendUnavailable { .. }));
    }

    #[test]
    fn test_kernel_adaptor_without_hardware_is_invalid() {
        let mut cfg = config(&[]);
        cfg.sensors.insert(
            "proximity".into(),
            SensorSettings {
                device_path: Some("/nonexistent/prox".into()),
                ..SensorSettings::default()
            },
        );
        let adaptor = build_adaptor("proximityadaptor", AdaptorKind::SysfsProximity, &cfg, None).unwrap();
        assert!(!adaptor.is_valid());
    }

    #[tokio::test]
    async fn test_load_default_channel_for_hybris_adaptor() {
        let hal = Arc::new(MockHal::typical_device());
        let hybris = HybrisManager::with_hal(hal as Arc<dyn SensorHal>, ManagerSettings::default(), WakeLock::disabled())
            .unwrap();
        let cfg = config(&[]);
        let manager = SensorManager::new();
        for (name, kind) in [
            ("accelerometeradaptor", AdaptorKind::HybrisAccelerometer),
            ("magnetometeradaptor", AdaptorKind::HybrisMagnetometer),
            ("orientationadaptor", AdaptorKind::HybrisOrientation),
        ] {
            let adaptor = build_adaptor(name, kind, &cfg, Some(&hybris)).unwrap();
            assert!(manager.register_adaptor(adaptor));
            load_default_channel(&manager, name, kind, &mut ()).unwrap();
        }
        let mut names: Vec<String> = manager.channel_infos().into_iter().map(|i| i.name).collect();
        names.sort();
        assert_eq!(names, vec!["accelerometersensor", "magnetometersensor", "orientationsensor"]);
        manager.shutdown();
        hybris.shutdown().unwrap();
    }
}
