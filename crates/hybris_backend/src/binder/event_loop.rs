//! Single outstanding request regime
//!
//! Exactly one POLL is in flight at any time: the next one is only issued
//! after the previous reply was dispatched. Service death tears the
//! connection down, and the loop reconnects after a fixed delay.

use std::sync::Arc;
use std::time::Duration;

use contracts::{DaemonSettings, Result, SensorError, SensorHal};
use metrics::counter;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use super::client::BinderSensorHal;
use super::transport::ServiceConnector;
use crate::manager::HybrisManager;

/// Timing of the binder regime
#[derive(Debug, Clone)]
pub struct BinderLoopSettings {
    /// Events requested per POLL
    pub batch_size: i32,
    /// Sleep between connection attempts
    pub reconnect_delay: Duration,
    /// Sleep after a failed POLL transaction
    pub poll_error_backoff: Duration,
}

impl Default for BinderLoopSettings {
    fn default() -> Self {
        Self {
            batch_size: 16,
            reconnect_delay: Duration::from_millis(1000),
            poll_error_backoff: Duration::from_millis(50),
        }
    }
}

impl From<&DaemonSettings> for BinderLoopSettings {
    fn from(s: &DaemonSettings) -> Self {
        Self {
            batch_size: s.batch_size as i32,
            reconnect_delay: Duration::from_millis(s.reconnect_delay_ms),
            ..Self::default()
        }
    }
}

/// Drives the sensor service connection for a [`HybrisManager`]
pub struct BinderEventLoop<C: ServiceConnector> {
    connector: C,
    manager: Arc<HybrisManager>,
    settings: BinderLoopSettings,
}

impl<C> BinderEventLoop<C>
where
    C: ServiceConnector + Sync,
{
    pub fn new(connector: C, manager: Arc<HybrisManager>, settings: BinderLoopSettings) -> Self {
        Self {
            connector,
            manager,
            settings,
        }
    }

    pub fn manager(&self) -> &Arc<HybrisManager> {
        &self.manager
    }

    /// One connection attempt: client, liveness POLL, sensor list
    #[instrument(name = "binder_connect", skip(self))]
    pub async fn connect(&self) -> Result<Arc<BinderSensorHal<C::Transport>>> {
        let transport = self.connector.connect().await?;
        let hal = Arc::new(BinderSensorHal::new(transport));
        hal.check_liveness().await?;
        let count = self.manager.attach(Arc::clone(&hal) as Arc<dyn SensorHal>)?;
        info!(sensors = count, "connected to sensor service");
        Ok(hal)
    }

    /// Connect, retrying after the fixed delay until it works or shutdown
    /// is requested. `None` means shutdown.
    pub async fn connect_with_retry(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<Arc<BinderSensorHal<C::Transport>>> {
        loop {
            if *shutdown.borrow() {
                return None;
            }
            match self.connect().await {
                Ok(hal) => return Some(hal),
                Err(e) => {
                    warn!(error = %e, "sensor service connection failed");
                    self.manager.detach();
                }
            }
            tokio::select! {
                _ = shutdown.changed() => return None,
                _ = tokio::time::sleep(self.settings.reconnect_delay) => {}
            }
        }
    }

    /// Poll until shutdown; reconnects whenever the service dies
    pub async fn run(
        &self,
        mut hal: Arc<BinderSensorHal<C::Transport>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let polled = tokio::select! {
                _ = shutdown.changed() => break,
                res = hal.poll_async(self.settings.batch_size) => res,
            };

            match polled {
                Ok(events) => {
                    self.manager.handle_batch(&events);
                }
                Err(SensorError::ServiceDied) => {
                    error!("sensor service died");
                    counter!("sensord_binder_reconnects_total").increment(1);
                    self.manager.detach();
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(self.settings.reconnect_delay) => {}
                    }
                    match self.connect_with_retry(&mut shutdown).await {
                        Some(fresh) => hal = fresh,
                        None => break,
                    }
                }
                Err(e) => {
                    warn!(error = %e, "poll failed");
                    counter!("sensord_hal_poll_errors_total").increment(1);
                    tokio::time::sleep(self.settings.poll_error_backoff).await;
                }
            }
        }
        info!("binder event loop stopped");
        Ok(())
    }
}
