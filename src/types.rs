use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// The application identities that can be logged in on one device.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Customer,
    Provider,
    Admin,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Customer => "customer",
            UserType::Provider => "provider",
            UserType::Admin => "admin",
        }
    }

    /// Parses a loosely-typed inbound value; trims and lower-cases first.
    pub fn parse(value: &str) -> Option<UserType> {
        match value.trim().to_ascii_lowercase().as_str() {
            "customer" => Some(UserType::Customer),
            "provider" => Some(UserType::Provider),
            "admin" => Some(UserType::Admin),
            _ => None,
        }
    }
}

impl Display for UserType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor of the client environment, carried alongside the token so the
/// backend can distinguish registrations from the same account on different
/// clients.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientInfo {
    pub browser: String,
    pub platform: String,
    pub user_agent: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            browser: "unknown".to_string(),
            platform: "web".to_string(),
            user_agent: format!("push-registry/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// The device's push credential. Replaced wholesale on rotation, never
/// partially updated.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceToken {
    pub token: String,
    pub device_id: String,
    pub browser: String,
    pub platform: String,
    pub user_agent: String,
    pub registered_at: u64,
}

/// One active identity on this device. At most one entry per user id exists
/// at any time; re-registration overwrites.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSubscription {
    pub user_id: String,
    pub user_type: UserType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub active_session_id: String,
    pub last_active: u64,
}

/// Optional profile details attached at registration time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Derives the coarse-grained targeting topics for a subscription. Topics are
/// computed on demand and never persisted separately.
pub fn topics_for(subscription: &UserSubscription, device_id: &str) -> Vec<String> {
    vec![
        format!("user_{}", subscription.user_id),
        format!("{}_notifications", subscription.user_type),
        format!("{}_{}", subscription.user_type, subscription.user_id),
        format!("device_{device_id}"),
    ]
}

/// Display fields of an inbound push message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// An inbound push message as delivered by the platform. The target fields
/// are loosely typed on the wire; the router normalizes them before routing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessagePayload {
    pub notification: Option<NotificationPayload>,
    pub data: Option<HashMap<String, String>>,
    pub target_user_id: Option<String>,
    pub target_user_type: Option<String>,
    pub message_id: Option<String>,
}

pub type MessageHandler = Arc<dyn Fn(MessagePayload) + Send + Sync + 'static>;

/// Receives payloads the router decided to surface, together with the device
/// id they were delivered on.
pub type DeliveryHandler = Arc<dyn Fn(MessagePayload, &str) + Send + Sync + 'static>;

pub type Unsubscribe = Box<dyn FnOnce() + Send + 'static>;
