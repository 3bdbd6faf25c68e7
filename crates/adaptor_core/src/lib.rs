//! # Adaptor Core
//!
//! Backend-independent half of every device adaptor.
//!
//! Responsibilities:
//! - `RingBuffer` hand-off from the hardware producer to channel readers
//! - Interval, standby-override and data-range arbitration across sessions
//! - Reference-counted start/stop shared by all logical channels
//! - The `DeviceAdaptor` capability trait implemented by each backend family
//! - `ReaderThread`, the stoppable producer thread used by blocking backends
//!
//! ## Usage Example
//!
//! ```ignore
//! use adaptor_core::{DeviceAdaptor, RingBuffer};
//!
//! let buffer = Arc::new(RingBuffer::<TimedUnsigned>::new(1));
//! core.set_adapted_sensor("pressure", "Pressure in Pa", buffer.clone());
//!
//! adaptor.set_interval(100, SessionId(3));
//! adaptor.start_sensor();
//! ```

mod adaptor;
mod arbitration;
mod power;
mod reader;
mod ring_buffer;
mod state;

pub use adaptor::DeviceAdaptor;
pub use arbitration::{
    evaluate_interval_requests, Arbitration, DataRangeQueue, SessionRequests,
};
pub use power::{write_to_file, PowerStateFile};
pub use reader::{sleep_unless_stopped, ReaderThread};
pub use ring_buffer::{BufferReader, RingBuffer, SlotWriter};
pub use state::{AdaptedSensorEntry, AdaptorCore};
