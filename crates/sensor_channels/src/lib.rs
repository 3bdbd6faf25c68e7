//! # Sensor Channels
//!
//! Client-facing side of the daemon.
//!
//! Responsibilities:
//! - `SensorManager`: adaptor registry with counted request/release,
//!   channel loading, session ids, display standby
//! - `SensorChannel<T>`: reads an adaptor buffer, suppresses unchanged
//!   values, fans out to per-session queues without blocking the producer
//!
//! ## Usage Example
//!
//! ```ignore
//! let manager = SensorManager::new();
//! manager.register_adaptor(stepcounter_adaptor);
//! let channel = manager.load_channel::<TimedUnsigned>("stepcountersensor", "stepcounteradaptor", None)?;
//! let session = manager.open_session("stepcountersensor")?;
//! let mut rx = channel.subscribe_default(session);
//! manager.start(session)?;
//! while let Some(sample) = rx.recv().await { /* ... */ }
//! ```

mod channel;
mod manager;
#[cfg(test)]
mod testing;

pub use channel::{ChannelControl, ChannelInfo, SensorChannel, DEFAULT_SESSION_QUEUE};
pub use manager::SensorManager;
