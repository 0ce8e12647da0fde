//! Broadcast audience resolution over the bus.
//!
//! Publishes `user.list.requested` under the create request's correlation id
//! and waits for `user.list.succeeded` or `user.list.failed`. The reply is
//! fed back through [`CorrelationBroker::resolve`] by the event handler.

use crate::ports::{DirectoryError, RecipientDirectory};
use async_trait::async_trait;
use shared_bus::{CorrelationBroker, CorrelationError};
use shared_types::{CorrelationId, EmptyPayload, Event};
use std::sync::Arc;
use std::time::Duration;

pub struct BusRecipientDirectory {
    correlation: Arc<CorrelationBroker>,
    exchange: String,
    timeout: Duration,
}

impl BusRecipientDirectory {
    pub fn new(
        correlation: Arc<CorrelationBroker>,
        exchange: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            correlation,
            exchange: exchange.into(),
            timeout,
        }
    }
}

#[async_trait]
impl RecipientDirectory for BusRecipientDirectory {
    async fn active_user_ids(
        &self,
        correlation_id: &CorrelationId,
    ) -> Result<Vec<String>, DirectoryError> {
        let reply = self
            .correlation
            .request(
                &self.exchange,
                Event::UserListRequested(EmptyPayload {}),
                Some(correlation_id.clone()),
                Some(self.timeout),
            )
            .await
            .map_err(|e| match e {
                CorrelationError::Timeout { waited_ms, .. } => DirectoryError::Timeout(waited_ms),
                other => DirectoryError::Failed(other.to_string()),
            })?;

        match reply.event {
            Event::UserListSucceeded(list) => Ok(list.users.into_iter().map(|u| u.id).collect()),
            Event::UserListFailed(failure) => Err(DirectoryError::Failed(failure.reason)),
            other => Err(DirectoryError::UnexpectedReply(
                other.event_type().to_string(),
            )),
        }
    }
}
