//! Prometheus metrics for Herald services.
//!
//! All metrics follow the naming convention: `herald_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., messages_published_total)
//! - **Gauge**: Value that can go up or down (e.g., correlation_pending)

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Herald metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // BROKER METRICS
    // =========================================================================

    /// Messages published, by exchange
    pub static ref BUS_MESSAGES_PUBLISHED: CounterVec = CounterVec::new(
        Opts::new("herald_bus_messages_published_total", "Messages published to an exchange"),
        &["exchange"]
    ).expect("metric creation failed");

    /// Messages consumed, by queue and settlement outcome
    pub static ref BUS_MESSAGES_CONSUMED: CounterVec = CounterVec::new(
        Opts::new("herald_bus_messages_consumed_total", "Messages settled by consumers"),
        &["queue", "outcome"]  // outcome: ack/nack/reject
    ).expect("metric creation failed");

    /// Messages routed to a dead-letter exchange
    pub static ref BUS_MESSAGES_DEAD_LETTERED: CounterVec = CounterVec::new(
        Opts::new("herald_bus_messages_dead_lettered_total", "Messages dead-lettered"),
        &["queue", "reason"]  // reason: rejected/delivery-limit
    ).expect("metric creation failed");

    // =========================================================================
    // CORRELATION METRICS
    // =========================================================================

    /// Outstanding correlated requests
    pub static ref CORRELATION_PENDING: Gauge = Gauge::new(
        "herald_correlation_pending",
        "Correlated requests awaiting a reply"
    ).expect("metric creation failed");

    /// Correlated requests that timed out
    pub static ref CORRELATION_TIMEOUTS: Counter = Counter::new(
        "herald_correlation_timeouts_total",
        "Correlated requests that received no reply in time"
    ).expect("metric creation failed");

    // =========================================================================
    // NOTIFICATION METRICS
    // =========================================================================

    /// Notifications created, by priority
    pub static ref NOTIFICATIONS_CREATED: CounterVec = CounterVec::new(
        Opts::new("herald_notifications_created_total", "Notifications persisted"),
        &["priority"]
    ).expect("metric creation failed");

    /// Recipient state transitions applied
    pub static ref RECIPIENT_TRANSITIONS: CounterVec = CounterVec::new(
        Opts::new("herald_recipient_transitions_total", "Recipient rows moved forward"),
        &["transition"]  // transition: delivered/read/acknowledged
    ).expect("metric creation failed");

    // =========================================================================
    // IDENTITY METRICS
    // =========================================================================

    /// Register/login attempts by outcome
    pub static ref IDENTITY_ATTEMPTS: CounterVec = CounterVec::new(
        Opts::new("herald_identity_attempts_total", "Identity operations by outcome"),
        &["operation", "outcome"]
    ).expect("metric creation failed");
}

/// Handle over the registered metric set.
#[derive(Clone)]
pub struct MetricsHandle {
    registry: Registry,
}

impl MetricsHandle {
    /// Render all metrics in the Prometheus text exposition format.
    pub fn gather_text(&self) -> Result<String, TelemetryError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
    }
}

/// Register all metrics with the Herald registry.
///
/// Safe to call more than once; already-registered collectors are skipped.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Broker
        Box::new(BUS_MESSAGES_PUBLISHED.clone()),
        Box::new(BUS_MESSAGES_CONSUMED.clone()),
        Box::new(BUS_MESSAGES_DEAD_LETTERED.clone()),
        // Correlation
        Box::new(CORRELATION_PENDING.clone()),
        Box::new(CORRELATION_TIMEOUTS.clone()),
        // Notifications
        Box::new(NOTIFICATIONS_CREATED.clone()),
        Box::new(RECIPIENT_TRANSITIONS.clone()),
        // Identity
        Box::new(IDENTITY_ATTEMPTS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        registry: REGISTRY.clone(),
    })
}
