//! Orientation and rotation vector, both published as compass headings

use contracts::{CompassData, DataRange, HalEvent, HalSensorType};

use super::{ConversionContext, HybrisSensorProfile};

const RADIANS_TO_DEGREES: f64 = 57.295_779_5;

/// Accuracy of the rotation vector that still counts as fully calibrated
const ACCURACY_FULL_RAD: f64 = 0.174_533;

const HEADING_RANGE: DataRange = DataRange::new(0.0, 359.0, 1.0);

fn convert_orientation(event: &HalEvent, _ctx: &ConversionContext) -> CompassData {
    CompassData::new(event.timestamp_us(), event.data[0] as i32, event.status())
}

/// Heading from the unit quaternion `(x, y, z, w)` plus estimated accuracy
/// in radians, as laid out in the rotation vector event.
fn convert_rotation_vector(event: &HalEvent, _ctx: &ConversionContext) -> CompassData {
    let v = &event.data;
    let q0 = f64::from(v[3]);
    let q1 = f64::from(v[0]);
    let q2 = f64::from(v[1]);
    let q3 = f64::from(v[2]);
    let accuracy = f64::from(v[4]);

    // Elements (0,1) and (1,1) of the rotation matrix
    let r1 = 2.0 * q1 * q2 - 2.0 * q3 * q0;
    let r4 = 1.0 - 2.0 * q1 * q1 - 2.0 * q3 * q3;
    let azimuth = r1.atan2(r4) * RADIANS_TO_DEGREES;
    let degrees = (azimuth + 360.0) as i32 % 360;

    let level = if accuracy < 0.0 {
        0
    } else if accuracy > 1e-5 {
        ((3.0 * ACCURACY_FULL_RAD / accuracy).floor() as i32).min(3)
    } else {
        3
    };
    CompassData::new(event.timestamp_us(), degrees, level)
}

pub const ORIENTATION: HybrisSensorProfile<CompassData> = HybrisSensorProfile {
    sensor_type: HalSensorType::Orientation,
    output: "hybrisorientation",
    output_description: "Internal orientation coordinates",
    description: "Hybris orientation",
    default_interval: None,
    data_range: |_| HEADING_RANGE,
    convert: convert_orientation,
};

pub const ROTATION: HybrisSensorProfile<CompassData> = HybrisSensorProfile {
    sensor_type: HalSensorType::RotationVector,
    output: "hybrisrotation",
    output_description: "Internal rotation coordinates",
    description: "Hybris rotation vector",
    default_interval: None,
    data_range: |_| HEADING_RANGE,
    convert: convert_rotation_vector,
};

define_hybris_adaptor!(
    /// Platform-fused heading in degrees
    HybrisOrientationAdaptor,
    CompassData,
    ORIENTATION
);

define_hybris_adaptor!(
    /// Heading derived from the rotation vector
    HybrisRotationAdaptor,
    CompassData,
    ROTATION
);

#[cfg(test)]
mod tests {
    use super::*;

    fn rotation_event(yaw_deg: f64, accuracy: f32) -> HalEvent {
        // Rotation about z only: q = (0, 0, sin(yaw/2), cos(yaw/2))
        let half = yaw_deg.to_radians() / 2.0;
        HalEvent::new(9, HalSensorType::RotationVector, 0).with_values(&[
            0.0,
            0.0,
            half.sin() as f32,
            half.cos() as f32,
            accuracy,
        ])
    }

    #[test]
    fn test_identity_quaternion_points_north() {
        let d = convert_rotation_vector(&rotation_event(0.0, 0.0), &ConversionContext::default());
        assert_eq!(d.degrees, 0);
        assert_eq!(d.level, 3);
    }

    #[test]
    fn test_yaw_maps_into_0_360() {
        let d = convert_rotation_vector(&rotation_event(90.0, 0.0), &ConversionContext::default());
        // Positive yaw turns the device counter-clockwise, heading goes west
        assert!((269..=270).contains(&d.degrees), "got {}", d.degrees);
        let d = convert_rotation_vector(&rotation_event(-90.0, 0.0), &ConversionContext::default());
        assert!((89..=90).contains(&d.degrees), "got {}", d.degrees);
    }

    #[test]
    fn test_accuracy_levels() {
        let ctx = ConversionContext::default();
        assert_eq!(convert_rotation_vector(&rotation_event(0.0, -1.0), &ctx).level, 0);
        assert_eq!(convert_rotation_vector(&rotation_event(0.0, 0.2), &ctx).level, 2);
        assert_eq!(convert_rotation_vector(&rotation_event(0.0, 1.0), &ctx).level, 0);
        assert_eq!(convert_rotation_vector(&rotation_event(0.0, 0.1), &ctx).level, 3);
    }

    #[test]
    fn test_orientation_uses_azimuth_and_status() {
        let event = HalEvent::new(4, HalSensorType::Orientation, 3_000).with_values(&[123.7, 4.0, -2.0, 2.0]);
        let d = convert_orientation(&event, &ConversionContext::default());
        assert_eq!(d.degrees, 123);
        assert_eq!(d.level, 2);
        assert_eq!(d.timestamp, 3);
    }
}
