//! Platform backend lifecycle: mock HAL, binder loopback or none

use std::sync::Arc;
use std::time::Duration;

use contracts::{BackendKind, DaemonSettings, SensorHal};
use hybris_backend::binder::{BinderEventLoop, BinderLoopSettings, LoopbackConnector, LoopbackService};
use hybris_backend::{HybrisManager, ManagerSettings, MockEventGenerator, MockHal, WakeLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::error::{CliError, Result};

/// Period of synthetic samples from the simulated HAL
pub const MOCK_SAMPLE_PERIOD: Duration = Duration::from_millis(100);

/// Running platform backend
pub enum Backend {
    /// In-process HAL polled by the manager's reader thread
    Mock {
        manager: Arc<HybrisManager>,
        generator: MockEventGenerator,
    },
    /// Binder regime against the loopback service
    Binder {
        manager: Arc<HybrisManager>,
        service: Arc<LoopbackService>,
        generator: MockEventGenerator,
        stop_tx: watch::Sender<bool>,
        task: JoinHandle<contracts::Result<()>>,
    },
    Disabled,
}

impl Backend {
    /// Connect the configured backend.
    ///
    /// Returns once the sensor list is known so hybris adaptors can be
    /// constructed against it.
    #[instrument(name = "backend_start", skip(settings), fields(backend = ?kind))]
    pub async fn start(kind: BackendKind, settings: &DaemonSettings) -> Result<Self> {
        let wakelock = || WakeLock::new(settings.wakelock_path.clone());
        match kind {
            BackendKind::Mock => {
                let hal = Arc::new(MockHal::typical_device());
                let manager = HybrisManager::with_hal(
                    Arc::clone(&hal) as Arc<dyn SensorHal>,
                    ManagerSettings::from(settings),
                    wakelock(),
                )?;
                manager.start_reader_thread()?;
                let generator = MockEventGenerator::spawn(hal, MOCK_SAMPLE_PERIOD);
                info!("mock hal backend started");
                Ok(Self::Mock { manager, generator })
            }
            BackendKind::BinderLoopback => {
                let hal = Arc::new(MockHal::typical_device());
                let service = LoopbackService::new(Arc::clone(&hal));
                let manager = Arc::new(HybrisManager::new(ManagerSettings::from(settings), wakelock()));
                let event_loop = BinderEventLoop::new(
                    LoopbackConnector::new(Arc::clone(&service)),
                    Arc::clone(&manager),
                    BinderLoopSettings::from(settings),
                );
                let (stop_tx, mut stop_rx) = watch::channel(false);
                let Some(client) = event_loop.connect_with_retry(&mut stop_rx).await else {
                    return Err(CliError::Sensor(contracts::SensorError::NotConnected));
                };
                let task = tokio::spawn(async move { event_loop.run(client, stop_rx).await });
                let generator = MockEventGenerator::spawn(hal, MOCK_SAMPLE_PERIOD);
                info!("binder loopback backend started");
                Ok(Self::Binder {
                    manager,
                    service,
                    generator,
                    stop_tx,
                    task,
                })
            }
            BackendKind::Disabled => {
                info!("platform backend disabled");
                Ok(Self::Disabled)
            }
        }
    }

    /// Manager shared by hybris adaptors, `None` when disabled
    pub fn hybris(&self) -> Option<&Arc<HybrisManager>> {
        match self {
            Self::Mock { manager, .. } | Self::Binder { manager, .. } => Some(manager),
            Self::Disabled => None,
        }
    }

    /// Loopback service, for simulating service death
    pub fn loopback_service(&self) -> Option<&Arc<LoopbackService>> {
        match self {
            Self::Binder { service, .. } => Some(service),
            _ => None,
        }
    }

    /// Deactivate every sensor and stop the delivery path.
    ///
    /// A reader thread that does not exit in time is reported as
    /// [`CliError::FatalShutdown`].
    #[instrument(name = "backend_stop", skip(self))]
    pub async fn stop(self) -> Result<()> {
        match self {
            Self::Mock { manager, mut generator } => {
                generator.stop();
                manager.shutdown().map_err(CliError::from_shutdown)
            }
            Self::Binder {
                manager,
                mut generator,
                stop_tx,
                task,
                ..
            } => {
                generator.stop();
                let _ = stop_tx.send(true);
                match task.await {
                    Ok(Err(e)) => warn!(error = %e, "binder event loop failed"),
                    Err(e) => warn!(error = %e, "binder event loop task panicked"),
                    Ok(Ok(())) => {}
                }
                manager.shutdown().map_err(CliError::from_shutdown)
            }
            Self::Disabled => Ok(()),
        }
    }
}
