//! Out-of-process sensor service over binder IPC
//!
//! No reader thread in this regime: [`BinderEventLoop`] keeps exactly one
//! POLL transaction outstanding and feeds every reply to the manager.

pub mod client;
pub mod codec;
pub mod event_loop;
pub mod loopback;
pub mod transport;

pub use client::BinderSensorHal;
pub use event_loop::{BinderEventLoop, BinderLoopSettings};
pub use loopback::{LoopbackConnector, LoopbackService, LoopbackTransport};
pub use transport::{BinderTransport, LocalBinderTransport, LocalServiceConnector, ServiceConnector};
