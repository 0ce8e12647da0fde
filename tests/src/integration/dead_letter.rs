//! # Dead Lettering
//!
//! ```text
//! undecodable body   ──reject──→ <service>.dlq   (x-death: rejected)
//! transient failure  ──nack────→ retry after the delay, up to the delivery limit
//!                                  └──→ <service>.dlq (x-death: delivery-limit)
//! <service>.dlq      ──TTL─────→ discarded
//! ```

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use node_runtime::wiring::{NOTIFICATION_QUEUE, NOTIFICATION_SERVICE, USER_QUEUE, USER_SERVICE};
    use shared_bus::DeathReason;
    use shared_types::{Event, EventEnvelope, UserRef};

    use crate::harness::{fast_config, TestNode};

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    fn unread_count(user_id: &str) -> Event {
        Event::NotificationUnreadCountRequested(UserRef::new(user_id))
    }

    // =========================================================================
    // TESTS
    // =========================================================================

    #[tokio::test]
    async fn test_malformed_message_rejected_without_retry() {
        let node = TestNode::start().await;
        let poison = b"{not json".to_vec();

        node.publish_raw("notification.create.requested", poison.clone());
        node.wait_until(|| node.dead_letter_depth(NOTIFICATION_SERVICE) == 1)
            .await;

        let letters = node.take_dead_letters(NOTIFICATION_SERVICE);
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].body, poison);
        assert_eq!(letters[0].properties.delivery_count, 0);
        let death = &letters[0].properties.x_death[0];
        assert_eq!(death.queue, NOTIFICATION_QUEUE);
        assert_eq!(death.reason, DeathReason::Rejected);
        assert_eq!(death.count, 1);

        node.stop().await;
    }

    #[tokio::test]
    async fn test_unknown_event_type_rejected() {
        let node = TestNode::start().await;
        let body = serde_json::json!({
            "eventType": "user.teleport.requested",
            "correlationId": "c-1",
            "timestamp": "2026-01-01T00:00:00Z",
            "source": "api-gateway",
            "payload": {}
        });

        node.publish_raw(
            "user.teleport.requested",
            serde_json::to_vec(&body).unwrap(),
        );
        node.wait_until(|| node.dead_letter_depth(USER_SERVICE) == 1)
            .await;

        let letters = node.take_dead_letters(USER_SERVICE);
        assert_eq!(letters[0].properties.x_death[0].queue, USER_QUEUE);
        assert_eq!(letters[0].properties.x_death[0].reason, DeathReason::Rejected);

        node.stop().await;
    }

    #[tokio::test]
    async fn test_transient_failure_exhausts_retry_budget() {
        let mut node = TestNode::start().await;
        node.container().notifications.set_unavailable(true);

        let correlation_id = node.send(unread_count("u1"));
        node.wait_until(|| node.dead_letter_depth(NOTIFICATION_SERVICE) == 1)
            .await;

        let letters = node.take_dead_letters(NOTIFICATION_SERVICE);
        let properties = &letters[0].properties;
        assert_eq!(properties.delivery_count, 3);
        assert_eq!(properties.x_death[0].reason, DeathReason::DeliveryLimit);
        assert_eq!(properties.x_death[0].queue, NOTIFICATION_QUEUE);

        // The original request is preserved for inspection
        let original = EventEnvelope::decode(&letters[0].body).unwrap();
        assert_eq!(original.correlation_id, correlation_id);

        // Transient failures are never reported as outcomes
        assert!(node
            .drain()
            .iter()
            .all(|envelope| envelope.correlation_id != correlation_id));

        node.stop().await;
    }

    #[tokio::test]
    async fn test_transient_failure_recovers_within_budget() {
        let mut config = fast_config();
        config.bus.retry_delay = Duration::from_millis(300);
        let mut node = TestNode::start_with(config).await;
        node.container().notifications.set_unavailable(true);

        let correlation_id = node.send(unread_count("u1"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        node.container().notifications.set_unavailable(false);

        let reply = node.reply_to(&correlation_id).await;
        assert!(matches!(
            reply.event,
            Event::NotificationUnreadCountSucceeded(_)
        ));
        assert_eq!(node.dead_letter_depth(NOTIFICATION_SERVICE), 0);

        node.stop().await;
    }

    #[tokio::test]
    async fn test_dead_letters_expire_after_ttl() {
        let mut config = fast_config();
        config.bus.dlq_ttl = Duration::from_millis(100);
        let node = TestNode::start_with(config).await;

        node.publish_raw("notification.markread.requested", b"garbage".to_vec());
        node.wait_until(|| node.dead_letter_depth(NOTIFICATION_SERVICE) == 1)
            .await;

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(node.dead_letter_depth(NOTIFICATION_SERVICE), 0);

        node.stop().await;
    }
}
