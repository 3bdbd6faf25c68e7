//! # Kernel Adaptors
//!
//! Adaptors reading Linux kernel interfaces directly.
//!
//! Responsibilities:
//! - `SysfsAdaptor`: reader thread over a set of files, woken by `poll`
//!   readiness or by a fixed interval
//! - IIO accelerometer, gyroscope, magnetometer and ambient light
//! - evdev humidity, pressure, temperature and lid switch
//! - ASCII proximity attribute
//!
//! ## Usage Example
//!
//! ```ignore
//! use kernel_adaptors::{IioAdaptor, IioDeviceKind};
//!
//! let accel = IioAdaptor::iio(IioDeviceKind::Accelerometer, "accelerometeradaptor", &settings);
//! accel.set_interval(50, SessionId(1));
//! accel.start_sensor();
//! ```

pub mod evdev;
pub mod iio;
pub mod proximity;
pub mod sysfs;

pub use evdev::{AbsValueInterpreter, AbsValueKind, EvdevProcessor, InputDevAdaptor, InputEvent, InputInterpreter, LidInterpreter};
pub use iio::{IioAdaptor, IioBuffer, IioDeviceKind, IioProcessor};
pub use proximity::{AsciiProximityProcessor, ProximityAsciiAdaptor};
pub use sysfs::{PollMode, SampleProcessor, SysfsAdaptor};
