//! # Broadcast Resolution
//!
//! A broadcast create asks the identity service for the active users under
//! the create request's own correlation id:
//!
//! ```text
//! Gateway ──notification.create.requested──→ Notifications (2)
//!                                              │ user.list.requested (same id)
//!                                              ↓
//!                                           Identity (1)
//!                                              │ user.list.succeeded | user.list.failed
//!                                              ↓
//!            notification.created | notification.create.failed
//! ```
//!
//! The directory-outage tests wire the notification consumer alone so the
//! test plays the identity side by hand.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use node_runtime::container::{NodeConfig, ServiceContainer};
    use node_runtime::wiring::{declare_topology, NOTIFICATION_QUEUE, USER_QUEUE};
    use shared_bus::{Consumer, QueueArgs};
    use shared_types::{
        CreateNotificationRequest, ErrorCode, Event, EventEnvelope, FailurePayload,
    };

    use crate::harness::{fast_config, TestNode, GATEWAY, WAIT};

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    fn broadcast() -> Event {
        Event::NotificationCreateRequested(CreateNotificationRequest {
            title: Some("All hands".into()),
            body: Some("Town hall in 10 minutes".into()),
            priority: Some("high".into()),
            sender_id: None,
            user_ids: Some(vec!["ignored".into()]),
            broadcast: true,
        })
    }

    /// Notification consumer only; no identity service answers.
    struct Isolated {
        container: Arc<ServiceContainer>,
    }

    impl Isolated {
        fn start(config: NodeConfig) -> Self {
            let container = Arc::new(ServiceContainer::new(config));
            declare_topology(&container.broker, &container.config.bus).unwrap();
            container
                .broker
                .declare_queue("outcomes", QueueArgs::new())
                .unwrap();
            container
                .broker
                .bind_queue("outcomes", &container.config.bus.exchange, "notification.create.#")
                .unwrap();
            container
                .broker
                .bind_queue("outcomes", &container.config.bus.exchange, "notification.created")
                .unwrap();

            let consumer = Consumer::new(
                Arc::clone(&container.broker),
                NOTIFICATION_QUEUE,
                Arc::new(container.notification_handler()),
            );
            tokio::spawn(consumer.run());
            Self { container }
        }

        fn publish(&self, envelope: &EventEnvelope) {
            self.container
                .broker
                .publish(
                    &self.container.config.bus.exchange,
                    envelope.routing_key(),
                    envelope.encode().unwrap(),
                )
                .unwrap();
        }

        async fn next(&self, queue: &str) -> EventEnvelope {
            let delivery = tokio::time::timeout(WAIT, self.container.broker.next_delivery(queue))
                .await
                .unwrap()
                .unwrap();
            let envelope = EventEnvelope::decode(delivery.body()).unwrap();
            delivery.ack();
            envelope
        }

        /// Next outcome, skipping the create request echoed by `notification.create.#`.
        async fn outcome(&self) -> EventEnvelope {
            loop {
                let envelope = self.next("outcomes").await;
                if !matches!(envelope.event, Event::NotificationCreateRequested(_)) {
                    return envelope;
                }
            }
        }
    }

    // =========================================================================
    // TESTS
    // =========================================================================

    #[tokio::test]
    async fn test_broadcast_reaches_every_active_user() {
        let mut node = TestNode::start().await;
        let ada = node.register("Ada", "ada@example.com").await;
        let bob = node.register("Bob", "bob@example.com").await;
        let eve = node.register("Eve", "eve@example.com").await;
        node.container().users.set_active(&eve.user_id, false);

        let correlation_id = node.send(broadcast());
        let reply = node.reply_to(&correlation_id).await;
        let Event::NotificationCreated(created) = reply.event else {
            panic!("expected notification.created, got {:?}", reply.event);
        };
        assert!(created.notification.broadcast);

        let recipients: HashSet<_> = created.recipient_ids.into_iter().collect();
        let expected: HashSet<_> = [ada.user_id, bob.user_id].into_iter().collect();
        assert_eq!(recipients, expected);

        // The user list travelled under the create request's id
        let expected_id = correlation_id.clone();
        let list = node
            .wait_for(move |e| {
                e.correlation_id == expected_id && matches!(e.event, Event::UserListSucceeded(_))
            })
            .await;
        assert_eq!(list.source, "user-service");

        node.stop().await;
    }

    #[tokio::test]
    async fn test_broadcast_without_users_fails() {
        let mut node = TestNode::start().await;

        let reply = node.request(broadcast()).await;
        let Event::NotificationCreateFailed(failure) = reply.event else {
            panic!("expected create failure, got {:?}", reply.event);
        };
        assert_eq!(failure.code, ErrorCode::BadRequest);
        assert_eq!(failure.reason, "No recipients specified");
        assert_eq!(node.container().notifications.recipient_count(), 0);

        node.stop().await;
    }

    #[tokio::test]
    async fn test_user_list_failure_resolves_before_timeout() {
        // Default 10 s broadcast timeout: only the failure reply can end this early
        let isolated = Isolated::start(NodeConfig::default());
        let started = Instant::now();

        let request = EventEnvelope::new(GATEWAY, Default::default(), broadcast());
        isolated.publish(&request);

        let list_request = isolated.next(USER_QUEUE).await;
        assert_eq!(list_request.correlation_id, request.correlation_id);
        assert!(matches!(list_request.event, Event::UserListRequested(_)));

        isolated.publish(&list_request.reply(
            "user-service",
            Event::UserListFailed(FailurePayload::new(ErrorCode::Internal, "store offline")),
        ));

        let outcome = isolated.outcome().await;
        assert_eq!(outcome.correlation_id, request.correlation_id);
        let Event::NotificationCreateFailed(failure) = outcome.event else {
            panic!("expected create failure, got {:?}", outcome.event);
        };
        assert_eq!(failure.code, ErrorCode::Internal);
        assert_eq!(failure.reason, "Broadcast failed: could not retrieve user list");
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(isolated.container.correlation.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unanswered_user_list_times_out() {
        let isolated = Isolated::start(fast_config());

        let request = EventEnvelope::new(GATEWAY, Default::default(), broadcast());
        isolated.publish(&request);

        let outcome = isolated.outcome().await;
        let Event::NotificationCreateFailed(failure) = outcome.event else {
            panic!("expected create failure, got {:?}", outcome.event);
        };
        assert_eq!(failure.code, ErrorCode::Internal);
        assert_eq!(isolated.container.notifications.recipient_count(), 0);
        assert_eq!(
            isolated
                .container
                .correlation
                .stats()
                .total_timeouts
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }
}
