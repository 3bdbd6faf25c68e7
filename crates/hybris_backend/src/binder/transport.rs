//! IPC transport abstraction
//!
//! The binder driver itself lives outside this crate. A transport only
//! needs to move request/reply parcels for a transaction code and report
//! the remote's death as [`SensorError::ServiceDied`](contracts::SensorError).

use bytes::Bytes;
use contracts::Result;

/// Client side of one connection to the sensor service
#[trait_variant::make(BinderTransport: Send)]
pub trait LocalBinderTransport {
    /// Blocking transaction used by the control path
    fn transact_sync(&self, code: u32, request: Bytes) -> Result<Bytes>;

    /// Asynchronous transaction, resolved when the reply arrives.
    ///
    /// Dropping the future cancels the transaction.
    async fn transact(&self, code: u32, request: Bytes) -> Result<Bytes>;

    /// Whether the remote object is still alive
    fn is_alive(&self) -> bool;
}

/// Service manager lookup
#[trait_variant::make(ServiceConnector: Send)]
pub trait LocalServiceConnector {
    type Transport: BinderTransport + Sync + 'static;

    /// Wait for the sensor service and open a client on it
    async fn connect(&self) -> Result<Self::Transport>;
}
