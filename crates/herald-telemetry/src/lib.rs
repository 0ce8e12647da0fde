//! # Herald Telemetry
//!
//! Logging and metrics bootstrap shared by every Herald service.
//!
//! ## Components
//!
//! - **Logs**: `tracing` subscriber with an `EnvFilter` and pretty or JSON output
//! - **Metrics**: Prometheus counters and gauges in a dedicated registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use herald_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(&config).expect("Failed to init telemetry");
//!
//!     // Your application code here
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `HERALD_SERVICE_NAME` | `herald` | Service name in logs |
//! | `HERALD_LOG_LEVEL` | `info` | Log filter (falls back to `RUST_LOG`) |
//! | `HERALD_JSON_LOGS` | `false` (`true` in containers) | JSON log output |
//! | `HERALD_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `HERALD_ENVIRONMENT` | `development` | Deployment environment |

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    register_metrics, MetricsHandle, BUS_MESSAGES_CONSUMED, BUS_MESSAGES_DEAD_LETTERED,
    BUS_MESSAGES_PUBLISHED, CORRELATION_PENDING, CORRELATION_TIMEOUTS, IDENTITY_ATTEMPTS,
    NOTIFICATIONS_CREATED, RECIPIENT_TRANSITIONS,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and metrics.
///
/// Returns a guard that must be held for the lifetime of the application.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first so counters incremented during startup are registered
    let metrics = register_metrics()?;

    init_logging(config)?;

    Ok(TelemetryGuard {
        metrics,
        service_name: config.service_name.clone(),
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    metrics: MetricsHandle,
    service_name: String,
}

impl TelemetryGuard {
    #[must_use]
    pub fn metrics(&self) -> &MetricsHandle {
        &self.metrics
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
