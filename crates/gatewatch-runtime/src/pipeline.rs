//! The pipeline service object.
//!
//! Owns the store handle, the event source, the notifier, and the poller
//! task with its cancellation token. Constructed once at startup and
//! passed by reference to collaborators; there is no ambient shared state.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use gatewatch_device::EventSource;
use gatewatch_store::AttendanceStore;

use crate::config::PollerConfig;
use crate::dispatcher::{NotificationDispatcher, Notifier};
use crate::error::{Result, RuntimeError};
use crate::poller::AccessPoller;

/// The event-ingestion pipeline: poller plus dispatch.
pub struct Pipeline {
    store: AttendanceStore,
    source: Arc<dyn EventSource>,
    notifier: Arc<dyn Notifier>,
    config: PollerConfig,
    /// Handle to the running poller task, if started.
    poller_handle: Option<JoinHandle<()>>,
    /// Shutdown signal sender for the running poller.
    shutdown_tx: Option<watch::Sender<bool>>,
}

impl Pipeline {
    /// Creates a pipeline; nothing runs until [`Pipeline::start`].
    pub fn new(
        store: AttendanceStore,
        source: Arc<dyn EventSource>,
        notifier: Arc<dyn Notifier>,
        config: PollerConfig,
    ) -> Self {
        Self {
            store,
            source,
            notifier,
            config,
            poller_handle: None,
            shutdown_tx: None,
        }
    }

    /// A handle to the underlying store.
    pub fn store(&self) -> AttendanceStore {
        self.store.clone()
    }

    /// Whether the poller task is running.
    pub fn is_started(&self) -> bool {
        self.poller_handle.is_some()
    }

    /// Spawns the poller task.
    ///
    /// A fresh watermark is used on every start, so a restart re-covers
    /// the source's lookback window.
    pub fn start(&mut self) -> Result<()> {
        if self.is_started() {
            return Err(RuntimeError::AlreadyStarted);
        }

        info!("starting pipeline");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let dispatcher =
            NotificationDispatcher::new(self.store.clone(), Arc::clone(&self.notifier));
        let mut poller = AccessPoller::new(
            Arc::clone(&self.source),
            self.store.clone(),
            dispatcher,
            self.config.poll_interval,
            shutdown_rx,
        );

        let handle = tokio::spawn(async move {
            poller.run().await;
        });

        self.poller_handle = Some(handle);
        self.shutdown_tx = Some(shutdown_tx);

        debug!("pipeline started");
        Ok(())
    }

    /// Stops the poller and waits for it to finish.
    ///
    /// Idempotent: stopping an already-stopped pipeline is a no-op.
    pub async fn shutdown(&mut self) -> Result<()> {
        let Some(handle) = self.poller_handle.take() else {
            debug!("shutdown requested but pipeline not running");
            return Ok(());
        };

        info!("shutting down pipeline");

        if let Some(tx) = self.shutdown_tx.take() {
            tx.send(true)
                .map_err(|e| RuntimeError::Shutdown(format!("failed to signal poller: {e}")))?;
        }

        handle
            .await
            .map_err(|e| RuntimeError::Shutdown(format!("poller task panicked: {e}")))?;

        info!("pipeline stopped");
        Ok(())
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // Signal shutdown if still running; the task is detached.
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
    }
}
