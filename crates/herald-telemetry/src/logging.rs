//! Structured logging setup.
//!
//! Logs carry consistent fields that log aggregators can index:
//! - `timestamp`: RFC 3339 timestamp
//! - `level`: Log level (trace, debug, info, warn, error)
//! - `target`: Emitting module
//! - `service`: Service name (via [`log_event!`](crate::log_event))
//! - `correlation_id`: Request correlation id where one exists
//! - Additional context fields

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Install the global tracing subscriber.
///
/// JSON output is used in containers and pretty output in development. With
/// `console_output` disabled only the filter is installed.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_new(&config.log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .map_err(|e| TelemetryError::Config(e.to_string()))?;

    let json_layer = (config.console_output && config.json_logs).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });

    let pretty_layer = (config.console_output && !config.json_logs).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        environment = %config.environment,
        json_logs = config.json_logs,
        "Logging initialized"
    );

    Ok(())
}

/// Helper to create structured log entries with a service field.
#[macro_export]
macro_rules! log_event {
    (info, $service:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            service = $service,
            $($($field)*,)?
            $msg
        )
    };

    (warn, $service:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(
            service = $service,
            $($($field)*,)?
            $msg
        )
    };

    (error, $service:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(
            service = $service,
            $($($field)*,)?
            $msg
        )
    };

    (debug, $service:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(
            service = $service,
            $($($field)*,)?
            $msg
        )
    };
}
