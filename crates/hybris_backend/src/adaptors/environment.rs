//! Pressure, ambient light and proximity

use contracts::{DataRange, HalEvent, HalSensorType, ProximityData, TimedUnsigned};

use super::{ConversionContext, HybrisSensorProfile};

/// hPa to Pa
const HECTOPASCAL_TO_PASCAL: f32 = 100.0;

fn positive(ctx: &ConversionContext, scale: f32) -> DataRange {
    DataRange::new(
        0.0,
        f64::from(ctx.max_range * scale),
        f64::from(ctx.resolution * scale),
    )
}

fn convert_pressure(event: &HalEvent, _ctx: &ConversionContext) -> TimedUnsigned {
    TimedUnsigned::new(event.timestamp_us(), (event.scalar() * HECTOPASCAL_TO_PASCAL) as u32)
}

fn convert_light(event: &HalEvent, _ctx: &ConversionContext) -> TimedUnsigned {
    TimedUnsigned::new(event.timestamp_us(), event.scalar() as u32)
}

/// Anything closer than the sensor's range counts as near
fn convert_proximity(event: &HalEvent, ctx: &ConversionContext) -> ProximityData {
    let distance = event.scalar();
    ProximityData {
        timestamp: event.timestamp_us(),
        value: distance as u32,
        within_proximity: distance < ctx.max_range,
    }
}

pub const PRESSURE: HybrisSensorProfile<TimedUnsigned> = HybrisSensorProfile {
    sensor_type: HalSensorType::Pressure,
    output: "pressure",
    output_description: "Internal ambient pressure sensor values",
    description: "Hybris pressure",
    default_interval: None,
    data_range: |ctx| positive(ctx, HECTOPASCAL_TO_PASCAL),
    convert: convert_pressure,
};

pub const ALS: HybrisSensorProfile<TimedUnsigned> = HybrisSensorProfile {
    sensor_type: HalSensorType::Light,
    output: "als",
    output_description: "Internal ambient light sensor lux values",
    description: "Hybris als",
    default_interval: None,
    data_range: |ctx| positive(ctx, 1.0),
    convert: convert_light,
};

pub const PROXIMITY: HybrisSensorProfile<ProximityData> = HybrisSensorProfile {
    sensor_type: HalSensorType::Proximity,
    output: "proximity",
    output_description: "Internal proximity sensor values",
    description: "Hybris proximity",
    default_interval: None,
    data_range: |ctx| positive(ctx, 1.0),
    convert: convert_proximity,
};

define_hybris_adaptor!(
    /// Barometer in Pa
    HybrisPressureAdaptor,
    TimedUnsigned,
    PRESSURE
);

define_hybris_adaptor!(
    /// Ambient light in lux
    HybrisAlsAdaptor,
    TimedUnsigned,
    ALS
);

define_hybris_adaptor!(
    HybrisProximityAdaptor,
    ProximityData,
    PROXIMITY
);
