//! # Service Container
//!
//! Builds the broker, the transport and every service with its adapters.
//!
//! ## Construction Order
//!
//! ```text
//! Broker ──→ Publisher ──→ CorrelationBroker
//!                │                │
//!                ├──→ Identity (1)│
//!                ├──→ Notifications (2) ←── BusRecipientDirectory
//!                └──→ PushGateway
//! ```
//!
//! ## Thread Safety
//!
//! - Everything is wrapped in `Arc` for shared ownership
//! - Stores synchronise internally; handlers share them freely

use std::sync::Arc;

use hd_01_identity::adapters::{Argon2Hasher, JwtConfig, JwtIssuer, MemoryUserStore};
use hd_01_identity::{IdentityEventHandler, IdentityService};
use hd_02_notifications::adapters::{BusRecipientDirectory, MemoryNotificationStore};
use hd_02_notifications::{NotificationEventHandler, NotificationService};
use shared_bus::{BrokerConfig, BrokerPublisher, CorrelationBroker, EventPublisher, InMemoryBroker};
use tracing::info;

use crate::container::config::NodeConfig;
use crate::handlers::PushGateway;

/// Central container holding every service instance.
pub struct ServiceContainer {
    pub config: NodeConfig,

    // =========================================================================
    // SHARED INFRASTRUCTURE
    // =========================================================================
    pub broker: Arc<InMemoryBroker>,
    pub publisher: Arc<BrokerPublisher>,
    /// Pending broadcast resolutions of the notification service.
    pub correlation: Arc<CorrelationBroker>,

    // =========================================================================
    // STORES
    // =========================================================================
    pub users: Arc<MemoryUserStore>,
    pub notifications: Arc<MemoryNotificationStore>,

    // =========================================================================
    // SERVICES
    // =========================================================================
    pub identity: Arc<IdentityService>,
    pub notification_service: Arc<NotificationService>,
    pub push: Arc<PushGateway>,
}

impl ServiceContainer {
    pub fn new(config: NodeConfig) -> Self {
        let broker = InMemoryBroker::new(BrokerConfig {
            retry_delay: config.bus.retry_delay,
        });
        let publisher = Arc::new(BrokerPublisher::new(Arc::clone(&broker)));
        let dyn_publisher: Arc<dyn EventPublisher> = publisher.clone();

        let correlation = Arc::new(CorrelationBroker::new(
            Arc::clone(&dyn_publisher),
            hd_02_notifications::SERVICE_NAME,
            config.bus.broadcast_timeout,
        ));

        let users = Arc::new(MemoryUserStore::new());
        let identity = Arc::new(IdentityService::new(
            users.clone(),
            Arc::new(Argon2Hasher::new()),
            Arc::new(JwtIssuer::new(JwtConfig {
                secret: config.identity.jwt_secret.clone(),
                expiry_mins: config.identity.jwt_expiry_mins,
            })),
        ));

        let notifications = Arc::new(MemoryNotificationStore::new());
        let directory = Arc::new(BusRecipientDirectory::new(
            Arc::clone(&correlation),
            config.bus.exchange.clone(),
            config.bus.broadcast_timeout,
        ));
        let notification_service = Arc::new(NotificationService::new(
            notifications.clone(),
            directory,
        ));

        let push = Arc::new(PushGateway::new(
            Arc::clone(&dyn_publisher),
            config.bus.exchange.clone(),
        ));

        info!(environment = %config.environment, "Service container initialised");
        Self {
            config,
            broker,
            publisher,
            correlation,
            users,
            notifications,
            identity,
            notification_service,
            push,
        }
    }

    #[must_use]
    pub fn identity_handler(&self) -> IdentityEventHandler<IdentityService> {
        IdentityEventHandler::new(
            Arc::clone(&self.identity),
            self.publisher.clone(),
            self.config.bus.exchange.clone(),
        )
    }

    #[must_use]
    pub fn notification_handler(&self) -> NotificationEventHandler<NotificationService> {
        NotificationEventHandler::new(
            Arc::clone(&self.notification_service),
            Arc::clone(&self.correlation),
            self.publisher.clone(),
            self.config.bus.exchange.clone(),
        )
    }
}
