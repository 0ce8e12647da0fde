//! IPC Handler for the identity service
//!
//! Consumes `user.#.requested` and answers each request with exactly one
//! outcome event carrying the request's correlation id.
//!
//! | Request | Success | Failure |
//! |---------|---------|---------|
//! | `user.auth.register.requested` | `user.auth.register.succeeded` | `user.auth.register.failed` |
//! | `user.auth.login.requested` | `user.auth.login.succeeded` | `user.auth.login.failed` |
//! | `user.list.requested` | `user.list.succeeded` | `user.list.failed` |

use crate::domain::{Credentials, Registration};
use crate::error::IdentityError;
use crate::ports::IdentityApi;
use async_trait::async_trait;
use herald_telemetry::log_event;
use shared_bus::{EnvelopeHandler, EventPublisher, HandlerError};
use shared_types::{
    Event, EventEnvelope, FailurePayload, LoginSucceeded, RegisterSucceeded, UserListSucceeded,
};
use std::sync::Arc;
use tracing::debug;

/// Source name stamped on every envelope this service publishes.
pub const SERVICE_NAME: &str = "user-service";

/// Bus adapter for [`IdentityApi`].
pub struct IdentityEventHandler<A>
where
    A: IdentityApi,
{
    api: Arc<A>,
    publisher: Arc<dyn EventPublisher>,
    exchange: String,
}

impl<A> IdentityEventHandler<A>
where
    A: IdentityApi,
{
    pub fn new(api: Arc<A>, publisher: Arc<dyn EventPublisher>, exchange: impl Into<String>) -> Self {
        Self {
            api,
            publisher,
            exchange: exchange.into(),
        }
    }

    async fn reply(&self, request: &EventEnvelope, event: Event) -> Result<(), HandlerError> {
        let reply = request.reply(SERVICE_NAME, event);
        self.publisher.emit(&self.exchange, &reply).await?;
        Ok(())
    }

    /// Publish a failure event, or hand transient errors back for redelivery.
    async fn fail(
        &self,
        request: &EventEnvelope,
        error: IdentityError,
        to_event: fn(FailurePayload) -> Event,
    ) -> Result<(), HandlerError> {
        if error.kind().is_retryable() {
            return Err(HandlerError::Transient(error.to_string()));
        }
        debug!(
            correlation_id = %request.correlation_id,
            event_type = %request.event_type(),
            reason = %error,
            "Identity request rejected"
        );
        self.reply(request, to_event(FailurePayload::new(error.code(), error.reason())))
            .await
    }

    async fn handle_register(
        &self,
        envelope: &EventEnvelope,
        registration: Result<Registration, IdentityError>,
    ) -> Result<(), HandlerError> {
        let result = match registration {
            Ok(registration) => self.api.register(registration).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(outcome) => {
                let succeeded = RegisterSucceeded {
                    role: outcome.role(),
                    user_id: outcome.user.id,
                    name: outcome.user.name,
                    email: outcome.user.email,
                    access_token: outcome.access_token,
                };
                self.reply(envelope, Event::UserRegisterSucceeded(succeeded)).await
            }
            Err(e) => self.fail(envelope, e, Event::UserRegisterFailed).await,
        }
    }

    async fn handle_login(
        &self,
        envelope: &EventEnvelope,
        credentials: Result<Credentials, IdentityError>,
    ) -> Result<(), HandlerError> {
        let result = match credentials {
            Ok(credentials) => self.api.login(credentials).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(outcome) => {
                let succeeded = LoginSucceeded {
                    role: outcome.role(),
                    user_id: outcome.user.id,
                    access_token: outcome.access_token,
                };
                self.reply(envelope, Event::UserLoginSucceeded(succeeded)).await
            }
            Err(e) => self.fail(envelope, e, Event::UserLoginFailed).await,
        }
    }

    /// Listing failures are always reported so a waiting broadcast fails
    /// fast instead of running into its timeout.
    async fn handle_list(&self, envelope: &EventEnvelope) -> Result<(), HandlerError> {
        match self.api.list_active_users().await {
            Ok(users) => {
                self.reply(envelope, Event::UserListSucceeded(UserListSucceeded { users }))
                    .await
            }
            Err(e) => {
                log_event!(
                    warn,
                    SERVICE_NAME,
                    "User listing failed",
                    correlation_id = %envelope.correlation_id,
                    error = %e
                );
                let payload = FailurePayload::new(e.code(), e.reason());
                self.reply(envelope, Event::UserListFailed(payload)).await
            }
        }
    }
}

#[async_trait]
impl<A> EnvelopeHandler for IdentityEventHandler<A>
where
    A: IdentityApi + 'static,
{
    async fn handle(&self, envelope: EventEnvelope) -> Result<(), HandlerError> {
        match &envelope.event {
            Event::UserRegisterRequested(request) => {
                let registration = Registration::try_from(request.clone());
                self.handle_register(&envelope, registration).await
            }
            Event::UserLoginRequested(request) => {
                let credentials = Credentials::try_from(request.clone());
                self.handle_login(&envelope, credentials).await
            }
            Event::UserListRequested(_) => self.handle_list(&envelope).await,
            other => {
                debug!(event_type = %other.event_type(), "Ignoring event not addressed to identity");
                Ok(())
            }
        }
    }
}
