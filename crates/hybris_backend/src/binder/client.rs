//! Sensor HAL over a binder transport

use std::time::Duration;

use contracts::{HalEvent, Result, SensorHal, SensorInfo};
use tracing::{debug, instrument};

use super::codec::{self, codes};
use super::transport::BinderTransport;

/// [`SensorHal`] backed by remote transactions
pub struct BinderSensorHal<T> {
    transport: T,
}

impl<T: BinderTransport + Sync> BinderSensorHal<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_alive(&self) -> bool {
        self.transport.is_alive()
    }

    /// Issue one POLL and wait for its reply
    pub async fn poll_async(&self, max_events: i32) -> Result<Vec<HalEvent>> {
        let reply = self
            .transport
            .transact(codes::POLL, codec::encode_poll(max_events))
            .await?;
        codec::decode_events(reply)
    }

    /// Empty POLL used to verify a fresh connection
    #[instrument(name = "binder_liveness_check", skip(self))]
    pub async fn check_liveness(&self) -> Result<()> {
        let events = self.poll_async(0).await?;
        debug!(returned = events.len(), "liveness poll answered");
        Ok(())
    }
}

impl<T: BinderTransport + Sync> SensorHal for BinderSensorHal<T> {
    fn sensor_list(&self) -> Result<Vec<SensorInfo>> {
        let reply = self
            .transport
            .transact_sync(codes::GET_SENSORS_LIST, bytes::Bytes::new())?;
        codec::decode_sensor_list(reply)
    }

    fn activate(&self, handle: i32, enabled: bool) -> Result<()> {
        let mut reply = self
            .transport
            .transact_sync(codes::ACTIVATE, codec::encode_activate(handle, enabled))?;
        codec::read_reply_header(&mut reply, "activate", handle)
    }

    fn set_delay(&self, handle: i32, delay_ns: i64) -> Result<()> {
        let mut reply = self
            .transport
            .transact_sync(codes::BATCH, codec::encode_batch(handle, delay_ns))?;
        codec::read_reply_header(&mut reply, "batch", handle)
    }

    /// Synchronous POLL; the event loop uses [`BinderSensorHal::poll_async`]
    fn poll(&self, max_events: usize, _timeout: Duration) -> Result<Vec<HalEvent>> {
        let reply = self
            .transport
            .transact_sync(codes::POLL, codec::encode_poll(max_events as i32))?;
        codec::decode_events(reply)
    }

    fn requires_delay_before_activate(&self) -> bool {
        true
    }
}
