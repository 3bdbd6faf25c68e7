//! Accelerometer, gyroscope and magnetometer

use contracts::{CalibratedMagneticFieldData, DataRange, HalEvent, HalSensorType, TimedXyzData};

use super::{ConversionContext, HybrisSensorProfile};

/// m/s² to milli-G
const GRAVITY_RECIPROCAL_THOUSANDS: f32 = 101.971_62;

/// rad/s to mdeg/s
const RAD_TO_MILLIDEGREES: f32 = 57.295_78 * 1000.0;

/// µT to nT
const MICROTESLA_TO_NANOTESLA: f32 = 1000.0;

fn scaled_xyz(event: &HalEvent, scale: f32) -> TimedXyzData {
    let (x, y, z) = event.vector();
    TimedXyzData::new(
        event.timestamp_us(),
        (x * scale) as i32,
        (y * scale) as i32,
        (z * scale) as i32,
    )
}

fn symmetric(ctx: &ConversionContext, scale: f32) -> DataRange {
    let max = f64::from(ctx.max_range * scale);
    DataRange::new(-max, max, f64::from(ctx.resolution * scale))
}

fn convert_accelerometer(event: &HalEvent, _ctx: &ConversionContext) -> TimedXyzData {
    scaled_xyz(event, GRAVITY_RECIPROCAL_THOUSANDS)
}

fn convert_gyroscope(event: &HalEvent, _ctx: &ConversionContext) -> TimedXyzData {
    scaled_xyz(event, RAD_TO_MILLIDEGREES)
}

fn convert_magnetometer(event: &HalEvent, _ctx: &ConversionContext) -> CalibratedMagneticFieldData {
    let (x, y, z) = event.vector();
    let (x, y, z) = (
        (x * MICROTESLA_TO_NANOTESLA) as i32,
        (y * MICROTESLA_TO_NANOTESLA) as i32,
        (z * MICROTESLA_TO_NANOTESLA) as i32,
    );
    CalibratedMagneticFieldData {
        timestamp: event.timestamp_us(),
        x,
        y,
        z,
        rx: x,
        ry: y,
        rz: z,
        level: event.status(),
    }
}

pub const ACCELEROMETER: HybrisSensorProfile<TimedXyzData> = HybrisSensorProfile {
    sensor_type: HalSensorType::Accelerometer,
    output: "accelerometer",
    output_description: "Internal accelerometer coordinates",
    description: "Hybris accelerometer",
    default_interval: None,
    data_range: |ctx| symmetric(ctx, GRAVITY_RECIPROCAL_THOUSANDS),
    convert: convert_accelerometer,
};

pub const GYROSCOPE: HybrisSensorProfile<TimedXyzData> = HybrisSensorProfile {
    sensor_type: HalSensorType::Gyroscope,
    output: "gyroscope",
    output_description: "Internal gyroscope coordinates",
    description: "Hybris gyroscope",
    default_interval: Some(50),
    data_range: |ctx| symmetric(ctx, RAD_TO_MILLIDEGREES),
    convert: convert_gyroscope,
};

pub const MAGNETOMETER: HybrisSensorProfile<CalibratedMagneticFieldData> = HybrisSensorProfile {
    sensor_type: HalSensorType::MagneticField,
    output: "magnetometer",
    output_description: "Internal magnetometer coordinates",
    description: "Hybris magnetometer",
    default_interval: Some(50),
    data_range: |ctx| symmetric(ctx, MICROTESLA_TO_NANOTESLA),
    convert: convert_magnetometer,
};

define_hybris_adaptor!(
    /// Accelerometer in milli-G
    HybrisAccelerometerAdaptor,
    TimedXyzData,
    ACCELEROMETER
);

define_hybris_adaptor!(
    /// Gyroscope in mdeg/s
    HybrisGyroscopeAdaptor,
    TimedXyzData,
    GYROSCOPE
);

define_hybris_adaptor!(
    /// Magnetometer in nT with calibration level
    HybrisMagnetometerAdaptor,
    CalibratedMagneticFieldData,
    MAGNETOMETER
);
