//! # Hybris Backend
//!
//! Adaptors over the platform sensor HAL.
//!
//! Responsibilities:
//! - Own the one connection to the sensor provider (`HybrisManager`)
//! - Enumerate sensors, program delays and activation, inject fallbacks
//! - Deliver events through a reader thread (in-process HAL) or a
//!   single-outstanding-request loop (binder service)
//! - Convert HAL events into sample records per sensor type
//!
//! ## Usage Example
//!
//! ```ignore
//! use hybris_backend::{HybrisManager, ManagerSettings, MockHal, WakeLock};
//!
//! let hal = Arc::new(MockHal::typical_device());
//! let manager = HybrisManager::with_hal(hal, ManagerSettings::default(), WakeLock::disabled())?;
//! let gyro = HybrisGyroscopeAdaptor::new("gyroscopeadaptor", manager.clone(), &settings);
//! manager.start_reader_thread()?;
//! gyro.start_sensor();
//! ```

pub mod adaptors;
pub mod binder;
mod manager;
mod mock;
mod table;
mod wakelock;

pub use adaptors::*;
pub use manager::{BatchOutcome, HalSampleSink, HybrisManager, ManagerSettings, MALFORMED_BATCH_BACKOFF};
pub use mock::{typical_sensor_list, HalCall, MockEventGenerator, MockHal, MockHalConfig};
pub use table::{derive_delays, SensorState, SensorTable};
pub use wakelock::WakeLock;
