//! In-process sensor service speaking the binder parcel format
//!
//! Serves transactions from a [`MockHal`] so the full IPC regime (codec,
//! single outstanding poll, death and reconnect) runs without a binder
//! driver. Tests kill and revive the service to exercise reconnection.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use contracts::{Result, SensorError, SensorHal};
use tokio::sync::Notify;
use tracing::{debug, info};

use super::codec::{self, codes};
use super::transport::{BinderTransport, ServiceConnector};
use crate::mock::MockHal;

/// How often a pending POLL re-checks the mock queue
const POLL_RECHECK: Duration = Duration::from_millis(5);

/// Status returned by the HAL for unknown handles
const BAD_VALUE: i32 = -22;

/// Registered service instance
pub struct LoopbackService {
    hal: Arc<MockHal>,
    alive: AtomicBool,
    generation: AtomicUsize,
    died: Notify,
}

impl LoopbackService {
    pub fn new(hal: Arc<MockHal>) -> Arc<Self> {
        Arc::new(Self {
            hal,
            alive: AtomicBool::new(true),
            generation: AtomicUsize::new(0),
            died: Notify::new(),
        })
    }

    pub fn hal(&self) -> &Arc<MockHal> {
        &self.hal
    }

    /// Simulate the service process dying
    pub fn kill(&self) {
        info!("loopback sensor service killed");
        self.alive.store(false, Ordering::SeqCst);
        self.died.notify_waiters();
    }

    /// Re-register the service; existing clients stay dead
    pub fn revive(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.alive.store(true, Ordering::SeqCst);
        info!("loopback sensor service registered");
    }

    pub fn is_registered(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Number of times the service was revived
    pub fn generation(&self) -> usize {
        self.generation.load(Ordering::SeqCst)
    }

    fn dispatch(&self, code: u32, request: Bytes) -> Result<Bytes> {
        let reply = match code {
            codes::GET_SENSORS_LIST => codec::encode_sensor_list(&self.hal.sensor_list()?),
            codes::ACTIVATE => {
                let (handle, enabled) = codec::decode_activate(request)?;
                codec::encode_status_reply(status_of(self.hal.activate(handle, enabled)))
            }
            codes::BATCH => {
                let (handle, period) = codec::decode_batch(request)?;
                codec::encode_status_reply(status_of(self.hal.set_delay(handle, period)))
            }
            codes::POLL => {
                let max = codec::decode_poll(request)?.max(0) as usize;
                codec::encode_events(&self.hal.poll(max, Duration::ZERO)?)
            }
            codes::SET_OPERATION_MODE => codec::encode_status_reply(0),
            other => return Err(SensorError::transport(other, "unknown transaction")),
        };
        Ok(reply)
    }
}

fn status_of(result: Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(SensorError::Hal { status, .. }) => status,
        Err(_) => BAD_VALUE,
    }
}

/// Client bound to one service generation
pub struct LoopbackTransport {
    service: Arc<LoopbackService>,
    generation: usize,
}

impl LoopbackTransport {
    fn check_alive(&self) -> Result<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(SensorError::ServiceDied)
        }
    }
}

impl BinderTransport for LoopbackTransport {
    fn transact_sync(&self, code: u32, request: Bytes) -> Result<Bytes> {
        self.check_alive()?;
        self.service.dispatch(code, request)
    }

    async fn transact(&self, code: u32, request: Bytes) -> Result<Bytes> {
        self.check_alive()?;
        if code != codes::POLL {
            return self.service.dispatch(code, request);
        }

        let max = codec::decode_poll(request.clone())?;
        if max == 0 {
            return self.service.dispatch(code, request);
        }
        // A real POLL blocks in the service until events exist
        loop {
            self.check_alive()?;
            let reply = self.service.dispatch(code, request.clone())?;
            if !codec::decode_events(reply.clone())?.is_empty() {
                return Ok(reply);
            }
            tokio::select! {
                _ = self.service.died.notified() => {}
                _ = tokio::time::sleep(POLL_RECHECK) => {}
            }
        }
    }

    fn is_alive(&self) -> bool {
        self.service.is_registered() && self.service.generation() == self.generation
    }
}

/// Service manager returning clients of the loopback service
#[derive(Clone)]
pub struct LoopbackConnector {
    service: Arc<LoopbackService>,
}

impl LoopbackConnector {
    pub fn new(service: Arc<LoopbackService>) -> Self {
        Self { service }
    }
}

impl ServiceConnector for LoopbackConnector {
    type Transport = LoopbackTransport;

    async fn connect(&self) -> Result<LoopbackTransport> {
        if !self.service.is_registered() {
            return Err(SensorError::transport(0, "sensor service not registered"));
        }
        debug!(generation = self.service.generation(), "loopback client created");
        Ok(LoopbackTransport {
            service: Arc::clone(&self.service),
            generation: self.service.generation(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::client::BinderSensorHal;
    use contracts::{HalEvent, HalSensorType};

    #[tokio::test]
    async fn test_transactions_round_trip_through_mock() {
        let service = LoopbackService::new(Arc::new(MockHal::typical_device()));
        let hal = BinderSensorHal::new(LoopbackConnector::new(Arc::clone(&service)).connect().await.unwrap());

        assert_eq!(hal.sensor_list().unwrap().len(), 10);
        hal.activate(1, true).unwrap();
        assert!(service.hal().is_active(1));
        assert!(matches!(
            hal.activate(99, true),
            Err(SensorError::Hal { status: -22, .. })
        ));

        service.hal().inject([HalEvent::new(1, HalSensorType::Accelerometer, 7)]);
        let events = hal.poll_async(16).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp_ns, 7);
    }

    #[tokio::test]
    async fn test_death_fails_pending_poll() {
        let service = LoopbackService::new(Arc::new(MockHal::typical_device()));
        let hal = BinderSensorHal::new(LoopbackConnector::new(Arc::clone(&service)).connect().await.unwrap());
        hal.check_liveness().await.unwrap();

        let killer = Arc::clone(&service);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            killer.kill();
        });
        let err = hal.poll_async(16).await.unwrap_err();
        assert!(matches!(err, SensorError::ServiceDied));

        service.revive();
        // Old client stays dead after the service comes back
        assert!(!hal.is_alive());
    }
}
