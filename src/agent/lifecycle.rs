//! Agent lifecycle: start, run, shutdown
//!
//! The agent wires a reading source and a broker connection to the publish
//! scheduler, and owns the process lifecycle around them. The connection is
//! injected through the [`Connection`] trait so the whole lifecycle runs
//! against mocks in tests.

use crate::agent::scheduler::PublishScheduler;
use crate::config::AgentConfig;
use crate::sensor::ReadingSource;
use crate::transport::{Connection, LifecycleEvent};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

/// Lifecycle failures. Only the initial connect is fatal to the process;
/// everything after it is handled inside the loop.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Failed to establish broker connection: {0}")]
    ConnectionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Disconnect failed: {0}")]
    DisconnectFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Clonable handle that requests a graceful shutdown of a running agent
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn request(&self) {
        let _ = self.tx.send(true);
    }
}

/// Telemetry agent with injected connection and reading source
pub struct Agent<C>
where
    C: Connection + 'static,
{
    config: AgentConfig,
    connection: C,
    source: Box<dyn ReadingSource>,
    scheduler: PublishScheduler,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<C> Agent<C>
where
    C: Connection + 'static,
{
    pub fn new(config: AgentConfig, connection: C, source: Box<dyn ReadingSource>) -> Self {
        let scheduler = PublishScheduler::new(&config);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            connection,
            source,
            scheduler,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        }
    }

    /// Handle for signal handlers (or tests) to request shutdown
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Access the connection, mainly for tests
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Sequence number of the last publish attempt
    pub fn last_sequence(&self) -> u64 {
        self.scheduler.last_sequence()
    }

    /// Establish the initial broker session.
    ///
    /// Failure here is the one fatal path: the caller reports it and exits
    /// non-zero. Session losses after this point are recovered internally by
    /// the connection and surface only as lifecycle events.
    pub async fn start(&mut self) -> Result<(), LifecycleError> {
        info!(
            device_id = %self.config.device.id,
            broker_url = %self.config.mqtt.broker_url,
            "Connecting to broker"
        );

        self.connection
            .connect()
            .await
            .map_err(|e| LifecycleError::ConnectionFailed(Box::new(e)))?;

        info!("Broker connection established");
        Ok(())
    }

    /// Run the publish loop and the lifecycle-event observer until shutdown
    /// is requested. Returns once the loop has drained: any in-flight
    /// publish has resolved (bounded by the publish timeout).
    pub async fn run(&mut self) {
        let mut events = self.connection.lifecycle_events();
        let mut observer_shutdown = self.shutdown_rx.clone();

        // Interruptions require no application-level action (the connection
        // reconnects internally); the observer exists for the log record.
        let observer = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = observer_shutdown.changed() => {
                        if *observer_shutdown.borrow() {
                            break;
                        }
                    }
                    event = events.recv() => match event {
                        Ok(LifecycleEvent::Interrupted { reason }) => {
                            warn!(%reason, "Connection interrupted; transport is reconnecting");
                        }
                        Ok(LifecycleEvent::Resumed) => {
                            info!("Connection resumed");
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "Lifecycle observer lagged behind");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });

        self.scheduler
            .run(
                &self.connection,
                self.source.as_mut(),
                self.shutdown_rx.clone(),
            )
            .await;

        let _ = observer.await;
    }

    /// Graceful teardown: flips the shutdown flag (idempotent) and performs
    /// the guaranteed disconnect.
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutdown initiated");
        let _ = self.shutdown_tx.send(true);

        self.connection
            .disconnect()
            .await
            .map_err(|e| LifecycleError::DisconnectFailed(Box::new(e)))?;

        info!("Shutdown complete");
        Ok(())
    }
}
