//! Step counter

use contracts::{DataRange, HalEvent, HalSensorType, TimedUnsigned};

use super::{ConversionContext, HybrisSensorProfile};

fn convert_step_counter(event: &HalEvent, _ctx: &ConversionContext) -> TimedUnsigned {
    TimedUnsigned::new(event.timestamp_us(), event.step_counter as u32)
}

pub const STEPCOUNTER: HybrisSensorProfile<TimedUnsigned> = HybrisSensorProfile {
    sensor_type: HalSensorType::StepCounter,
    output: "stepcounter",
    output_description: "Internal step counter steps since reboot",
    description: "Hybris step counter",
    default_interval: None,
    data_range: |_| DataRange::new(0.0, f64::from(u32::MAX), 1.0),
    convert: convert_step_counter,
};

define_hybris_adaptor!(
    /// Steps since reboot
    HybrisStepCounterAdaptor,
    TimedUnsigned,
    STEPCOUNTER
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_counter_field() {
        let event = HalEvent::new(10, HalSensorType::StepCounter, 9_000).with_step_counter(1234);
        let d = convert_step_counter(&event, &ConversionContext::default());
        assert_eq!(d.value, 1234);
        assert_eq!(d.timestamp, 9);
    }
}
