//! # Notification Lifecycle
//!
//! One high-priority notification for two users, end to end:
//!
//! ```text
//! create ──→ notification.created ──→ push (u1 online) ──→ notification.delivered
//!                                                              │
//!                                               u1: created → delivered
//! mark-read  ──→ notification.read          u1: delivered → read
//! acknowledge ─→ notification.acknowledged  u1: read → acknowledged (twice, same time)
//! ```

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hd_02_notifications::{NotificationApi, Page};
    use node_runtime::handlers::PushMessage;
    use node_runtime::wiring::NOTIFICATION_SERVICE;
    use shared_types::{
        CorrelationId, CreateNotificationRequest, EmptyPayload, ErrorCode, Event, EventEnvelope,
        ListNotificationsRequest, RecipientRef, RecipientStatus, UserRef,
    };

    use crate::harness::TestNode;

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    fn create(priority: &str, users: &[&str]) -> Event {
        Event::NotificationCreateRequested(CreateNotificationRequest {
            title: Some("Maintenance".into()),
            body: Some("The service restarts at 22:00".into()),
            priority: Some(priority.into()),
            sender_id: Some("admin-1".into()),
            user_ids: Some(users.iter().map(|u| u.to_string()).collect()),
            broadcast: false,
        })
    }

    fn recipient(notification_id: &str, user_id: &str) -> RecipientRef {
        RecipientRef::new(notification_id, user_id)
    }

    async fn status_of(node: &TestNode, user_id: &str) -> RecipientStatus {
        let page = node
            .container()
            .notification_service
            .list(user_id, Page::default())
            .await
            .unwrap();
        page.items[0].status
    }

    async fn wait_for_status(node: &TestNode, user_id: &str, status: RecipientStatus) {
        for _ in 0..500 {
            if status_of(node, user_id).await == status {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("{user_id} never reached {status:?}");
    }

    // =========================================================================
    // TESTS
    // =========================================================================

    #[tokio::test]
    async fn test_full_lifecycle_for_connected_and_offline_recipient() {
        let mut node = TestNode::start().await;
        let (_, mut session) = node.container().push.sessions().connect("u1");

        let reply = node.request(create("critical", &["u1", "u2"])).await;
        let Event::NotificationCreated(created) = reply.event else {
            panic!("expected notification.created, got {:?}", reply.event);
        };
        assert_eq!(created.recipient_ids, vec!["u1", "u2"]);
        let id = created.notification.id.clone();

        // Online recipient receives the push and the delivery is confirmed
        let Some(PushMessage::New(pushed)) = session.recv().await else {
            panic!("expected a pushed notification");
        };
        assert_eq!(pushed.id, id);
        wait_for_status(&node, "u1", RecipientStatus::Delivered).await;
        assert_eq!(status_of(&node, "u2").await, RecipientStatus::Created);

        // Mark read
        let reply = node
            .request(Event::NotificationMarkReadRequested(recipient(&id, "u1")))
            .await;
        let Event::NotificationRead(read) = reply.event else {
            panic!("expected notification.read, got {:?}", reply.event);
        };
        assert_eq!(read.user_id, "u1");
        assert!(matches!(session.recv().await, Some(PushMessage::Read(_))));

        // Acknowledge twice: the second reports the first time
        let first = node
            .request(Event::NotificationAcknowledgeRequested(recipient(&id, "u1")))
            .await;
        let second = node
            .request(Event::NotificationAcknowledgeRequested(recipient(&id, "u1")))
            .await;
        let (Event::NotificationAcknowledged(first), Event::NotificationAcknowledged(second)) =
            (first.event, second.event)
        else {
            panic!("expected two acknowledgements");
        };
        assert_eq!(first.acknowledged_at, second.acknowledged_at);
        assert_eq!(first.read_at, read.read_at);
        assert!(matches!(
            session.recv().await,
            Some(PushMessage::Acknowledged(_))
        ));

        // Read models
        let reply = node
            .request(Event::NotificationUnreadCountRequested(UserRef::new("u2")))
            .await;
        let Event::NotificationUnreadCountSucceeded(count) = reply.event else {
            panic!("expected unread count");
        };
        assert_eq!(count.count, 1);

        let reply = node
            .request(Event::NotificationPendingCriticalRequested(UserRef::new("u2")))
            .await;
        let Event::NotificationPendingCriticalSucceeded(pending) = reply.event else {
            panic!("expected pending critical");
        };
        assert_eq!(pending.notifications.len(), 1);
        assert_eq!(pending.notifications[0].notification.id, id);

        let reply = node
            .request(Event::NotificationHistoryRequested(EmptyPayload {}))
            .await;
        let Event::NotificationHistorySucceeded(history) = reply.event else {
            panic!("expected history");
        };
        let entry = &history.notifications[0];
        assert_eq!(entry.recipient_count, 2);
        assert_eq!(entry.delivered_count, 1);
        assert_eq!(entry.read_count, 1);
        assert_eq!(entry.acknowledged_count, 1);

        node.stop().await;
    }

    #[tokio::test]
    async fn test_low_priority_cannot_be_acknowledged() {
        let mut node = TestNode::start().await;

        let reply = node.request(create("info", &["u1"])).await;
        let Event::NotificationCreated(created) = reply.event else {
            panic!("expected notification.created");
        };
        let id = created.notification.id;

        let reply = node
            .request(Event::NotificationAcknowledgeRequested(recipient(&id, "u1")))
            .await;
        let Event::NotificationAcknowledgeFailed(failure) = reply.event else {
            panic!("expected acknowledge failure, got {:?}", reply.event);
        };
        assert_eq!(failure.code, ErrorCode::BadRequest);
        assert_eq!(failure.notification_id.as_deref(), Some(id.as_str()));
        assert_eq!(status_of(&node, "u1").await, RecipientStatus::Created);

        node.stop().await;
    }

    #[tokio::test]
    async fn test_mark_all_read_and_paged_inbox() {
        let mut node = TestNode::start().await;
        for i in 0..3 {
            let reply = node.request(create("medium", &["u1"])).await;
            assert!(
                matches!(reply.event, Event::NotificationCreated(_)),
                "create #{i} failed"
            );
        }

        let reply = node
            .request(Event::NotificationListRequested(
                ListNotificationsRequest::new("u1", Some(2), Some(2)),
            ))
            .await;
        let Event::NotificationListSucceeded(list) = reply.event else {
            panic!("expected list");
        };
        assert_eq!(list.total, 3);
        assert_eq!(list.notifications.len(), 1);
        assert_eq!((list.page, list.limit), (2, 2));

        let reply = node
            .request(Event::NotificationMarkAllReadRequested(UserRef::new("u1")))
            .await;
        let Event::NotificationMarkAllReadSucceeded(done) = reply.event else {
            panic!("expected mark-all-read");
        };
        assert_eq!(done.updated, 3);

        let reply = node
            .request(Event::NotificationUnreadCountRequested(UserRef::new("u1")))
            .await;
        let Event::NotificationUnreadCountSucceeded(count) = reply.event else {
            panic!("expected unread count");
        };
        assert_eq!(count.count, 0);

        node.stop().await;
    }

    #[tokio::test]
    async fn test_mark_read_unknown_recipient_fails() {
        let mut node = TestNode::start().await;

        let reply = node
            .request(Event::NotificationMarkReadRequested(recipient("missing", "u1")))
            .await;
        let Event::NotificationMarkReadFailed(failure) = reply.event else {
            panic!("expected mark-read failure, got {:?}", reply.event);
        };
        assert_eq!(failure.code, ErrorCode::NotFound);

        node.stop().await;
    }

    #[tokio::test]
    async fn test_redelivered_create_reuses_the_notification() {
        let mut node = TestNode::start().await;

        let correlation_id = CorrelationId::new();
        node.send_with(&correlation_id, create("medium", &["u1", "u2"]));
        let first = node.reply_to(&correlation_id).await;
        node.send_with(&correlation_id, create("medium", &["u1", "u2"]));
        let second = node.reply_to(&correlation_id).await;

        let (Event::NotificationCreated(first), Event::NotificationCreated(second)) =
            (first.event, second.event)
        else {
            panic!("expected two created replies");
        };
        assert_eq!(first.notification.id, second.notification.id);
        let history = node
            .container()
            .notification_service
            .history()
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].recipient_count, 2);

        node.stop().await;
    }

    #[tokio::test]
    async fn test_mark_read_missing_user_fails_without_dead_lettering() {
        let mut node = TestNode::start().await;

        // A gateway that only forwards the notification id
        let correlation_id = CorrelationId::new();
        let envelope = EventEnvelope::new(
            "api-gateway",
            correlation_id.clone(),
            Event::NotificationMarkReadRequested(RecipientRef::default()),
        );
        let mut body: serde_json::Value =
            serde_json::from_slice(&envelope.encode().unwrap()).unwrap();
        body["payload"] = serde_json::json!({"notificationId": "n1"});
        node.publish_raw(
            "notification.markread.requested",
            serde_json::to_vec(&body).unwrap(),
        );

        let reply = node.reply_to(&correlation_id).await;
        let Event::NotificationMarkReadFailed(failure) = reply.event else {
            panic!("expected mark-read failure, got {:?}", reply.event);
        };
        assert_eq!(failure.code, ErrorCode::BadRequest);
        assert_eq!(failure.reason, "Missing required fields: notificationId, userId");
        assert_eq!(node.dead_letter_depth(NOTIFICATION_SERVICE), 0);

        node.stop().await;
    }

    #[tokio::test]
    async fn test_acknowledge_missing_notification_fails() {
        let mut node = TestNode::start().await;

        let reply = node
            .request(Event::NotificationAcknowledgeRequested(RecipientRef {
                notification_id: None,
                user_id: Some("u1".into()),
            }))
            .await;
        let Event::NotificationAcknowledgeFailed(failure) = reply.event else {
            panic!("expected acknowledge failure, got {:?}", reply.event);
        };
        assert_eq!(failure.code, ErrorCode::BadRequest);
        assert_eq!(failure.reason, "Missing required fields: notificationId, userId");
        assert_eq!(node.dead_letter_depth(NOTIFICATION_SERVICE), 0);

        node.stop().await;
    }

    #[tokio::test]
    async fn test_delivery_for_unknown_row_reports_failure() {
        let mut node = TestNode::start().await;

        let reply = node
            .request(Event::NotificationDelivered(shared_types::Delivered {
                notification_id: "missing".into(),
                recipient_id: "u1".into(),
                delivered_at: None,
            }))
            .await;
        let Event::NotificationDeliverFailed(failure) = reply.event else {
            panic!("expected deliver failure, got {:?}", reply.event);
        };
        assert_eq!(failure.notification_id.as_deref(), Some("missing"));

        node.stop().await;
    }
}
