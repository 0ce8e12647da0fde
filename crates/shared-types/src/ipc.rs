//! # Event Taxonomy and Payloads
//!
//! Every message on the broker is one variant of the closed [`Event`] union.
//! The variant is selected by the envelope's `eventType`, which doubles as the
//! routing key:
//!
//! ```text
//! <domain>.<action>.<requested|succeeded|failed>
//! notification.<created|read|acknowledged|delivered>   (terminal state events)
//! ```
//!
//! ## Request / Outcome Pairs
//!
//! | Request | Success | Failure |
//! |---------|---------|---------|
//! | `user.auth.register.requested` | `user.auth.register.succeeded` | `user.auth.register.failed` |
//! | `user.auth.login.requested` | `user.auth.login.succeeded` | `user.auth.login.failed` |
//! | `user.list.requested` | `user.list.succeeded` | `user.list.failed` |
//! | `notification.create.requested` | `notification.created` | `notification.create.failed` |
//! | `notification.list.requested` | `notification.list.succeeded` | `notification.list.failed` |
//! | `notification.markread.requested` | `notification.read` | `notification.markread.failed` |
//! | `notification.markallread.requested` | `notification.markallread.succeeded` | `notification.markallread.failed` |
//! | `notification.acknowledge.requested` | `notification.acknowledged` | `notification.acknowledge.failed` |
//! | `notification.unreadcount.requested` | `notification.unreadcount.succeeded` | `notification.unreadcount.failed` |
//! | `notification.pendingcritical.requested` | `notification.pendingcritical.succeeded` | `notification.pendingcritical.failed` |
//! | `notification.delivered` | (none) | `notification.deliver.failed` |

use crate::entities::{HistoryEntry, InboxItem, NotificationView, Role, UserSummary};
use crate::errors::ErrorCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Declares `EventType`, its routing keys, and the `Event` union in one place
/// so the three can never drift apart.
macro_rules! define_events {
    ($( $(#[$doc:meta])* $variant:ident => $key:tt, $payload:ty; )+) => {
        /// Tag of an [`Event`]; its string form is the routing key.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum EventType {
            $( $(#[$doc])* $variant, )+
        }

        impl EventType {
            /// Every event type, in declaration order.
            pub const ALL: &'static [EventType] = &[ $( EventType::$variant, )+ ];

            /// Routing key (and wire `eventType`) for this event.
            #[must_use]
            pub fn routing_key(self) -> &'static str {
                match self {
                    $( EventType::$variant => $key, )+
                }
            }
        }

        /// Closed tagged union of every event on the bus.
        ///
        /// Serialized adjacently as `{"eventType": <key>, "payload": {...}}`.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "eventType", content = "payload")]
        pub enum Event {
            $( $(#[$doc])* #[serde(rename = $key)] $variant($payload), )+
        }

        impl Event {
            #[must_use]
            pub fn event_type(&self) -> EventType {
                match self {
                    $( Event::$variant(_) => EventType::$variant, )+
                }
            }
        }
    };
}

define_events! {
    // ----- identity -----
    UserRegisterRequested => "user.auth.register.requested", RegisterRequest;
    UserRegisterSucceeded => "user.auth.register.succeeded", RegisterSucceeded;
    UserRegisterFailed => "user.auth.register.failed", FailurePayload;
    UserLoginRequested => "user.auth.login.requested", LoginRequest;
    UserLoginSucceeded => "user.auth.login.succeeded", LoginSucceeded;
    UserLoginFailed => "user.auth.login.failed", FailurePayload;
    UserListRequested => "user.list.requested", EmptyPayload;
    UserListSucceeded => "user.list.succeeded", UserListSucceeded;
    UserListFailed => "user.list.failed", FailurePayload;

    // ----- notifications -----
    NotificationCreateRequested => "notification.create.requested", CreateNotificationRequest;
    NotificationCreated => "notification.created", NotificationCreated;
    NotificationCreateFailed => "notification.create.failed", FailurePayload;
    NotificationListRequested => "notification.list.requested", ListNotificationsRequest;
    NotificationListSucceeded => "notification.list.succeeded", NotificationList;
    NotificationListFailed => "notification.list.failed", FailurePayload;
    NotificationMarkReadRequested => "notification.markread.requested", RecipientRef;
    NotificationRead => "notification.read", NotificationRead;
    NotificationMarkReadFailed => "notification.markread.failed", FailurePayload;
    NotificationMarkAllReadRequested => "notification.markallread.requested", UserRef;
    NotificationMarkAllReadSucceeded => "notification.markallread.succeeded", MarkAllReadSucceeded;
    NotificationMarkAllReadFailed => "notification.markallread.failed", FailurePayload;
    NotificationAcknowledgeRequested => "notification.acknowledge.requested", RecipientRef;
    NotificationAcknowledged => "notification.acknowledged", NotificationAcknowledged;
    NotificationAcknowledgeFailed => "notification.acknowledge.failed", FailurePayload;
    NotificationUnreadCountRequested => "notification.unreadcount.requested", UserRef;
    NotificationUnreadCountSucceeded => "notification.unreadcount.succeeded", UnreadCount;
    NotificationUnreadCountFailed => "notification.unreadcount.failed", FailurePayload;
    NotificationHistoryRequested => "notification.history.requested", EmptyPayload;
    NotificationHistorySucceeded => "notification.history.succeeded", NotificationHistory;
    NotificationPendingCriticalRequested => "notification.pendingcritical.requested", UserRef;
    NotificationPendingCriticalSucceeded => "notification.pendingcritical.succeeded", PendingCritical;
    NotificationPendingCriticalFailed => "notification.pendingcritical.failed", FailurePayload;
    NotificationDelivered => "notification.delivered", Delivered;
    NotificationDeliverFailed => "notification.deliver.failed", FailurePayload;
}

impl EventType {
    /// `true` for `*.failed` events.
    #[must_use]
    pub fn is_failure(self) -> bool {
        self.routing_key().ends_with(".failed")
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.routing_key())
    }
}

/// Error for a routing key outside the closed event set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .copied()
            .find(|t| t.routing_key() == s)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

impl Event {
    /// Build an event from its tag and raw payload.
    pub fn from_parts(event_type: EventType, payload: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::json!({
            "eventType": event_type.routing_key(),
            "payload": payload,
        }))
    }

    /// Split an event into its tag and raw payload.
    pub fn to_parts(&self) -> Result<(EventType, Value), serde_json::Error> {
        let payload = match serde_json::to_value(self)? {
            Value::Object(mut map) => map.remove("payload").unwrap_or(Value::Object(Default::default())),
            _ => Value::Object(Default::default()),
        };
        Ok((self.event_type(), payload))
    }
}

// =============================================================================
// SHARED PAYLOADS
// =============================================================================

/// Payload for requests that carry no arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyPayload {}

/// Outcome of any failed request. Carries the request's correlation id via
/// the envelope, never in the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailurePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<String>,
    pub reason: String,
    pub code: ErrorCode,
}

impl FailurePayload {
    pub fn new(code: ErrorCode, reason: impl Into<String>) -> Self {
        Self {
            notification_id: None,
            reason: reason.into(),
            code,
        }
    }

    #[must_use]
    pub fn with_notification(mut self, notification_id: impl Into<String>) -> Self {
        self.notification_id = Some(notification_id.into());
        self
    }
}

// =============================================================================
// IDENTITY PAYLOADS
// =============================================================================

/// Registration request. Fields are optional on the wire so that missing
/// ones surface as a validation failure rather than a decode failure.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("role", &self.role)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSucceeded {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub access_token: String,
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginSucceeded {
    pub access_token: String,
    pub user_id: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListSucceeded {
    pub users: Vec<UserSummary>,
}

// =============================================================================
// NOTIFICATION PAYLOADS
// =============================================================================

/// Create request. `type` and `recipientIds` are accepted as aliases of
/// `priority` and `userIds`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default, alias = "type")]
    pub priority: Option<String>,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default, alias = "recipientIds")]
    pub user_ids: Option<Vec<String>>,
    #[serde(default)]
    pub broadcast: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationCreated {
    pub notification: NotificationView,
    pub recipient_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotificationsRequest {
    #[serde(default, alias = "recipientId")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationList {
    pub user_id: String,
    pub notifications: Vec<InboxItem>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl ListNotificationsRequest {
    #[must_use]
    pub fn new(user_id: impl Into<String>, page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            page,
            limit,
        }
    }
}

/// Identifies one recipient row.
///
/// Fields decode as optional; the handler answers an incomplete request with
/// a failure event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientRef {
    #[serde(default)]
    pub notification_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl RecipientRef {
    #[must_use]
    pub fn new(notification_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            notification_id: Some(notification_id.into()),
            user_id: Some(user_id.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    #[serde(default)]
    pub user_id: Option<String>,
}

impl UserRef {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRead {
    pub notification_id: String,
    pub user_id: String,
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllReadSucceeded {
    pub user_id: String,
    pub updated: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationAcknowledged {
    pub notification_id: String,
    pub user_id: String,
    pub acknowledged_at: DateTime<Utc>,
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub user_id: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationHistory {
    pub notifications: Vec<HistoryEntry>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCritical {
    pub user_id: String,
    pub notifications: Vec<InboxItem>,
}

/// Delivery confirmation from the realtime push edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivered {
    pub notification_id: String,
    #[serde(alias = "userId")]
    pub recipient_id: String,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
}
