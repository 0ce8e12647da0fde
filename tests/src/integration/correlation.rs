//! # Correlated Requests Across Services
//!
//! The notification service's [`CorrelationBroker`] driven against the live
//! identity consumer: replies are routed back through the notification
//! queue and matched by correlation id.
//!
//! [`CorrelationBroker`]: shared_bus::CorrelationBroker

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use shared_bus::{CorrelationError, ExchangeKind};
    use shared_types::{CorrelationId, EmptyPayload, Event, EventEnvelope, UserListSucceeded};

    use crate::harness::TestNode;

    fn list_users() -> Event {
        Event::UserListRequested(EmptyPayload {})
    }

    #[tokio::test]
    async fn test_request_resolves_through_identity() {
        let mut node = TestNode::start().await;
        let ada = node.register("Ada", "ada@example.com").await;
        let correlation = Arc::clone(&node.container().correlation);

        let correlation_id = CorrelationId::new();
        let reply = correlation
            .request(
                node.exchange(),
                list_users(),
                Some(correlation_id.clone()),
                Some(Duration::from_secs(2)),
            )
            .await
            .unwrap();

        assert_eq!(reply.correlation_id, correlation_id);
        let Event::UserListSucceeded(list) = reply.event else {
            panic!("expected user list, got {:?}", reply.event);
        };
        assert_eq!(list.users.len(), 1);
        assert_eq!(list.users[0].id, ada.user_id);
        assert_eq!(correlation.pending_count(), 0);

        node.stop().await;
    }

    #[tokio::test]
    async fn test_concurrent_requests_resolve_independently() {
        let node = TestNode::start().await;
        let exchange = node.exchange().to_string();
        let correlation = Arc::clone(&node.container().correlation);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let correlation = Arc::clone(&correlation);
            let exchange = exchange.clone();
            handles.push(tokio::spawn(async move {
                let correlation_id = CorrelationId::new();
                let reply = correlation
                    .request(
                        &exchange,
                        list_users(),
                        Some(correlation_id.clone()),
                        Some(Duration::from_secs(2)),
                    )
                    .await
                    .unwrap();
                (correlation_id, reply.correlation_id)
            }));
        }

        for handle in handles {
            let (sent, received) = handle.await.unwrap();
            assert_eq!(sent, received);
        }
        assert_eq!(correlation.stats().total_resolved.load(Ordering::Relaxed), 8);

        node.stop().await;
    }

    #[tokio::test]
    async fn test_pending_id_cannot_be_reused() {
        let node = TestNode::start().await;
        let correlation = Arc::clone(&node.container().correlation);
        let correlation_id = CorrelationId::new();
        node.container()
            .broker
            .declare_exchange("nowhere", ExchangeKind::Topic)
            .unwrap();

        // Hold the id with a request the identity service never sees
        let held = {
            let correlation = Arc::clone(&correlation);
            let correlation_id = correlation_id.clone();
            tokio::spawn(async move {
                correlation
                    .request(
                        "nowhere",
                        list_users(),
                        Some(correlation_id),
                        Some(Duration::from_millis(200)),
                    )
                    .await
            })
        };
        node.wait_until(|| correlation.is_pending(&correlation_id))
            .await;

        let err = correlation
            .request(node.exchange(), list_users(), Some(correlation_id.clone()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CorrelationError::Duplicate(_)));

        let held = held.await.unwrap();
        assert!(matches!(held, Err(CorrelationError::Timeout { .. })));

        node.stop().await;
    }

    #[tokio::test]
    async fn test_unmatched_reply_is_dropped() {
        let node = TestNode::start().await;
        let correlation = Arc::clone(&node.container().correlation);

        let stray = EventEnvelope::new(
            "user-service",
            CorrelationId::new(),
            Event::UserListSucceeded(UserListSucceeded { users: Vec::new() }),
        );
        node.publish_raw(stray.routing_key(), stray.encode().unwrap());

        let stats = correlation.stats();
        node.wait_until(|| stats.total_unmatched.load(Ordering::Relaxed) == 1)
            .await;
        assert_eq!(correlation.pending_count(), 0);

        node.stop().await;
    }
}
