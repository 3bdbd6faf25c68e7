//! # Contracts
//!
//! Shared data model for the sensor daemon. Every other crate depends on this
//! one; it depends on nothing inside the workspace.
//!
//! ## Time Model
//! - Sample timestamps are monotonic microseconds (`u64`) from an arbitrary
//!   epoch that stays consistent within one adaptor's stream
//! - Platform HAL events carry nanoseconds and are converted at the adaptor

mod config;
mod error;
mod hal;
mod range;
mod record;
mod sensor_hal;
mod sensor_name;
mod session;

pub use config::*;
pub use error::*;
pub use hal::*;
pub use range::DataRange;
pub use record::*;
pub use sensor_hal::SensorHal;
pub use sensor_name::SensorName;
pub use session::SessionId;
