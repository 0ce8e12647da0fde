//! # Herald Node Runtime
//!
//! Declares the broker topology, wires the services and runs one consumer
//! per service queue.
//!
//! ## Modular Structure
//!
//! - `container/` - Configuration and service construction
//! - `handlers/` - Boundary handlers (realtime push)
//! - `wiring/` - Broker topology
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (`.env`, then environment)
//! 2. Initialise telemetry
//! 3. Declare exchanges, queues and bindings
//! 4. Start consumers (spawn async tasks)
//! 5. Signal ready
//!
//! ## Failure Model
//!
//! A consumer whose broker connection closes is fatal: the runtime reports
//! it through [`NodeRuntime::wait_fatal`] and the binary exits non-zero.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod container;
pub mod handlers;
pub mod wiring;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use shared_bus::{BrokerError, Consumer, EnvelopeHandler};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::container::{NodeConfig, ServiceContainer};
use crate::wiring::{declare_topology, NOTIFICATION_QUEUE, PUSH_QUEUE, USER_QUEUE};

/// How long shutdown waits for consumer tasks to finish.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// The runtime orchestrating all services.
pub struct NodeRuntime {
    container: Arc<ServiceContainer>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    /// First fatal consumer error, if any.
    fatal_tx: Arc<watch::Sender<Option<String>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NodeRuntime {
    pub fn new(config: NodeConfig) -> Self {
        info!("Creating Herald node runtime");
        let container = Arc::new(ServiceContainer::new(config));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (fatal_tx, _) = watch::channel(None);

        Self {
            container,
            shutdown_tx,
            shutdown_rx,
            fatal_tx: Arc::new(fatal_tx),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Start the node runtime.
    pub async fn start(&self) -> Result<()> {
        info!("===========================================");
        info!("  Herald Node Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let config = &self.container.config;
        declare_topology(&self.container.broker, &config.bus)
            .context("Failed to declare broker topology")?;

        self.spawn_consumer(NOTIFICATION_QUEUE, Arc::new(self.container.notification_handler()));
        self.spawn_consumer(USER_QUEUE, Arc::new(self.container.identity_handler()));
        self.spawn_consumer(PUSH_QUEUE, Arc::clone(&self.container.push));

        info!(
            exchange = %config.bus.exchange,
            dlx = %config.bus.dead_letter_exchange,
            delivery_limit = config.bus.delivery_limit,
            "All consumers running"
        );
        Ok(())
    }

    fn spawn_consumer<H: EnvelopeHandler>(&self, queue: &'static str, handler: Arc<H>) {
        let consumer = Consumer::new(Arc::clone(&self.container.broker), queue, handler);
        let mut shutdown = self.shutdown_rx.clone();
        let stopping = self.shutdown_rx.clone();
        let fatal = Arc::clone(&self.fatal_tx);

        let handle = tokio::spawn(async move {
            tokio::select! {
                result = consumer.run() => {
                    let reason = match result {
                        Err(BrokerError::ConnectionClosed) => "broker connection closed".to_string(),
                        Err(e) => e.to_string(),
                        Ok(()) => "consumer stopped".to_string(),
                    };
                    if *stopping.borrow() {
                        return;
                    }
                    error!(queue, %reason, "Consumer terminated");
                    fatal.send_if_modified(|current| {
                        if current.is_some() {
                            return false;
                        }
                        *current = Some(format!("{queue}: {reason}"));
                        true
                    });
                }
                _ = shutdown.changed() => {
                    info!(queue, "Shutdown signal received");
                }
            }
        });
        self.tasks.lock().push(handle);
    }

    /// Resolves with the reason once any consumer fails fatally.
    pub async fn wait_fatal(&self) -> String {
        let mut rx = self.fatal_tx.subscribe();
        let reason = match rx.wait_for(Option::is_some).await {
            Ok(reason) => reason.clone().unwrap_or_default(),
            // The sender lives as long as `self`
            Err(_) => String::new(),
        };
        reason
    }

    /// Shutdown the node gracefully.
    ///
    /// ## Shutdown Sequence
    ///
    /// 1. Signal shutdown to all consumers
    /// 2. Wait for consumer tasks (bounded)
    /// 3. Close the broker connection
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for handle in tasks {
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                error!("Consumer did not stop within the grace period");
            }
        }
        self.container.broker.close();

        info!("Shutdown complete");
    }

    /// Get a reference to the service container.
    pub fn container(&self) -> Arc<ServiceContainer> {
        Arc::clone(&self.container)
    }
}
