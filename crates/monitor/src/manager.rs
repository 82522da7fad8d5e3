//! Monitor lifecycle: startup, supervision, shutdown.
//!
//! [`start`] validates the configuration, opens the bus transport, and
//! spawns the monitor's background task. The returned [`MonitorHandle`]
//! is the only way to observe or stop it; [`MonitorHandle::stop`]
//! requests cooperative termination, waits (bounded) for the task to
//! exit, then releases the transport.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use axon_core::config::MonitorConfig;
use axon_core::error::CoreError;
use axon_proto::client::{ClientError, ClientOptions, CorrelationClient};
use axon_proto::executor::RequestExecutor;

use crate::event::MonitorEvent;
use crate::monitor::MonitorTask;

/// Broadcast channel capacity for monitor events.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Bound on the wait for the poll task during [`MonitorHandle::stop`].
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to a running threshold monitor.
///
/// Dropping the handle does NOT stop the monitor; call
/// [`stop`](Self::stop).
#[derive(Debug)]
pub struct MonitorHandle {
    client: Arc<CorrelationClient>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    events: broadcast::Sender<MonitorEvent>,
}

impl MonitorHandle {
    /// Subscribe to the monitor's event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    /// The client this monitor samples through. The embedding system's
    /// transport reader feeds inbound frames to
    /// [`CorrelationClient::deliver`] on it.
    pub fn client(&self) -> &Arc<CorrelationClient> {
        &self.client
    }

    /// Request cooperative termination, wait for the poll task to exit,
    /// then release the transport.
    ///
    /// An in-flight request is abandoned, not awaited: the cancellation
    /// token interrupts both the interval sleep and the response wait,
    /// so this returns promptly rather than after a full reply timeout.
    pub async fn stop(self) {
        tracing::info!("Stopping threshold monitor");
        self.cancel.cancel();

        if tokio::time::timeout(STOP_TIMEOUT, self.task).await.is_err() {
            tracing::error!(
                timeout_secs = STOP_TIMEOUT.as_secs(),
                "Monitor task did not exit in time; abandoning it",
            );
        }

        self.client.close().await;
        tracing::info!("Threshold monitor stopped");
    }
}

/// Errors that abort monitor startup.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] CoreError),

    /// The executor's transport could not be established.
    #[error("Failed to open management bus transport: {0}")]
    Transport(ClientError),
}

/// Validate the configuration, open the transport, and spawn the
/// monitor's background task.
///
/// A transport that cannot be opened is fatal — no task is spawned and
/// the error propagates to the caller.
pub async fn start(
    config: MonitorConfig,
    executor: Arc<dyn RequestExecutor>,
    options: ClientOptions,
) -> Result<MonitorHandle, StartError> {
    config.validate()?;

    let client = CorrelationClient::connect(executor, options)
        .await
        .map_err(StartError::Transport)?;

    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();

    let monitor = MonitorTask::new(
        config,
        Arc::clone(&client),
        events.clone(),
        cancel.clone(),
    );
    let task = tokio::spawn(monitor.run());

    Ok(MonitorHandle {
        client,
        cancel,
        task,
        events,
    })
}
