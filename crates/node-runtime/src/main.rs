//! # Herald Node Runtime
//!
//! The main entry point for the Herald notification platform.
//!
//! ## Choreography
//!
//! ```text
//! Gateway ──notification.create.requested──→ Notifications (2)
//!                                                  │ (broadcast)
//!                                                  ├──user.list.requested──→ Identity (1)
//!                                                  │←─user.list.succeeded───┘
//!                                                  ↓
//!                                          notification.created
//!                                                  │
//!                                                  ↓
//!                                          PushGateway ──notification.delivered──→ Notifications (2)
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Load `.env` when present, then configuration from the environment
//! 2. Initialise telemetry
//! 3. Reject the development JWT secret outside development
//! 4. Declare the topology and start consumers
//! 5. Run until Ctrl+C or a fatal consumer error

use anyhow::{bail, Context, Result};
use herald_telemetry::{init_telemetry, TelemetryConfig};
use tracing::{error, info, warn};

use node_runtime::container::NodeConfig;
use node_runtime::NodeRuntime;

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to read .env: {e}");
        }
    }

    let telemetry = TelemetryConfig::from_env();
    let guard = init_telemetry(&telemetry).context("Failed to initialise telemetry")?;

    let config = NodeConfig::from_env().context("Invalid configuration")?;
    if !config.is_development() {
        config.validate_for_production()?;
    }

    let runtime = NodeRuntime::new(config);
    runtime.start().await?;

    info!("Node is running. Press Ctrl+C to stop.");
    let fatal = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("Failed to listen for Ctrl+C: {}", e);
            }
            None
        }
        reason = runtime.wait_fatal() => Some(reason),
    };

    runtime.shutdown().await;
    match guard.metrics().gather_text() {
        Ok(snapshot) => info!(metrics = %snapshot, "Final metrics snapshot"),
        Err(e) => warn!("Failed to gather metrics: {}", e),
    }

    if let Some(reason) = fatal {
        error!(%reason, "Fatal consumer error");
        bail!("fatal consumer error: {reason}");
    }
    Ok(())
}
