//! Platform sensor HAL abstraction
//!
//! The function table every hardware backend exposes to the hybris manager.
//! Implementations include the in-process mock and the binder client.

use std::time::Duration;

use crate::{HalEvent, Result, SensorInfo};

/// Platform sensor provider.
///
/// All methods take `&self`; implementations use interior mutability so
/// that the control path (session threads) and the event path (reader
/// thread) can share one instance.
pub trait SensorHal: Send + Sync {
    /// Enumerate physical sensors. Called once per connection.
    fn sensor_list(&self) -> Result<Vec<SensorInfo>>;

    /// Enable or disable delivery for one handle.
    fn activate(&self, handle: i32, enabled: bool) -> Result<()>;

    /// Set the sampling period in nanoseconds.
    fn set_delay(&self, handle: i32, delay_ns: i64) -> Result<()>;

    /// Block until events are available or `timeout` elapses.
    ///
    /// Returns at most `max_events` records; an empty vector means the
    /// timeout expired. The bounded wait is what lets the reader thread
    /// observe its stop flag.
    fn poll(&self, max_events: usize, timeout: Duration) -> Result<Vec<HalEvent>>;

    /// Whether a pending delay must be pushed before activation rather than
    /// re-applied after it. IPC services want the batch parameters first.
    fn requires_delay_before_activate(&self) -> bool {
        false
    }
}
