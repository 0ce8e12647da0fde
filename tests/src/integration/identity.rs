//! # Identity Over The Bus
//!
//! Registration and login as the gateway sees them: requests on
//! `user.auth.*.requested`, outcomes on the matching `succeeded`/`failed`
//! keys under the request's correlation id.

#[cfg(test)]
mod tests {
    use hd_01_identity::adapters::{JwtConfig, JwtIssuer};
    use shared_bus::QueueArgs;
    use shared_types::{EmptyPayload, ErrorCode, Event, LoginRequest, RegisterRequest, Role};

    use crate::harness::TestNode;

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    fn login(email: &str, password: &str) -> Event {
        Event::UserLoginRequested(LoginRequest {
            email: Some(email.into()),
            password: Some(password.into()),
        })
    }

    fn issuer(node: &TestNode) -> JwtIssuer {
        let identity = &node.container().config.identity;
        JwtIssuer::new(JwtConfig {
            secret: identity.jwt_secret.clone(),
            expiry_mins: identity.jwt_expiry_mins,
        })
    }

    // =========================================================================
    // TESTS
    // =========================================================================

    #[tokio::test]
    async fn test_register_then_login() {
        let mut node = TestNode::start().await;

        let registered = node.register("Ada", "ada@example.com").await;
        assert_eq!(registered.role, Role::User);
        let claims = issuer(&node).validate(&registered.access_token).unwrap();
        assert_eq!(claims.sub, registered.user_id);

        let reply = node
            .request(login("ada@example.com", "correct-horse"))
            .await;
        let Event::UserLoginSucceeded(logged_in) = reply.event else {
            panic!("expected login success, got {:?}", reply.event);
        };
        assert_eq!(logged_in.user_id, registered.user_id);
        assert!(issuer(&node).validate(&logged_in.access_token).is_ok());

        node.stop().await;
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let mut node = TestNode::start().await;
        node.register("Ada", "ada@example.com").await;

        let reply = node
            .request(Event::UserRegisterRequested(RegisterRequest {
                name: Some("Imposter".into()),
                email: Some("ada@example.com".into()),
                password: Some("another-pass".into()),
                role: None,
            }))
            .await;
        let Event::UserRegisterFailed(failure) = reply.event else {
            panic!("expected register failure, got {:?}", reply.event);
        };
        assert_eq!(failure.code, ErrorCode::Conflict);

        node.stop().await;
    }

    #[tokio::test]
    async fn test_missing_fields_and_bad_credentials() {
        let mut node = TestNode::start().await;
        node.register("Ada", "ada@example.com").await;

        let reply = node
            .request(Event::UserRegisterRequested(RegisterRequest::default()))
            .await;
        let Event::UserRegisterFailed(failure) = reply.event else {
            panic!("expected register failure");
        };
        assert_eq!(failure.code, ErrorCode::BadRequest);

        let wrong_password = node.request(login("ada@example.com", "nope")).await;
        let unknown_user = node.request(login("who@example.com", "nope")).await;
        for reply in [wrong_password, unknown_user] {
            let Event::UserLoginFailed(failure) = reply.event else {
                panic!("expected login failure, got {:?}", reply.event);
            };
            assert_eq!(failure.code, ErrorCode::Unauthorized);
            assert_eq!(failure.reason, "Invalid credentials");
        }

        node.stop().await;
    }

    #[tokio::test]
    async fn test_password_never_leaves_identity() {
        let mut node = TestNode::start().await;
        let broker = std::sync::Arc::clone(&node.container().broker);
        broker.declare_queue("wiretap", QueueArgs::new()).unwrap();
        broker.bind_queue("wiretap", node.exchange(), "#").unwrap();

        let registered = node.register("Ada", "ada@example.com").await;
        node.request(login("ada@example.com", "correct-horse")).await;
        let list_id = node.send(Event::UserListRequested(EmptyPayload {}));
        node.wait_for(move |e| e.correlation_id == list_id).await;

        let mut outcomes = 0;
        while let Some(delivery) = broker.try_get("wiretap").unwrap() {
            let routing_key = delivery.routing_key().to_string();
            let body = String::from_utf8(delivery.body().to_vec()).unwrap();
            delivery.ack();
            if routing_key.ends_with(".requested") {
                continue;
            }
            outcomes += 1;
            assert!(!body.contains("correct-horse"), "{routing_key} leaks the password");
            assert!(!body.contains("$argon2"), "{routing_key} leaks the hash");
        }
        assert_eq!(outcomes, 3);
        assert!(!registered.access_token.is_empty());

        node.stop().await;
    }
}
