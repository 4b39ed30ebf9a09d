use std::sync::Arc;

use log::debug;

use crate::registry::SubscriptionRegistry;
use crate::types::{DeliveryHandler, MessagePayload, UserType};

/// Normalized routing target of an inbound payload. The wire fields are
/// loosely typed; normalization happens once here at the boundary so the
/// routing table below stays free of optional-field handling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteTarget {
    /// No target fields: deliver when any identity is active.
    Broadcast,
    /// An explicit user id; takes precedence over a type target.
    User(String),
    Role(UserType),
    /// A target was present but unintelligible; always suppressed.
    Invalid,
}

impl RouteTarget {
    pub fn from_payload(payload: &MessagePayload) -> Self {
        let user_id = payload
            .target_user_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());
        let user_type = payload
            .target_user_type
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());
        match (user_id, user_type) {
            (None, None) => RouteTarget::Broadcast,
            (Some(id), _) => RouteTarget::User(id.to_string()),
            (None, Some(kind)) => match UserType::parse(kind) {
                Some(kind) => RouteTarget::Role(kind),
                None => RouteTarget::Invalid,
            },
        }
    }
}

/// Decides whether an inbound push message should be surfaced. Delivery is
/// pure dispatch: the payload and device id are handed to the external
/// handler; the router never renders and never mutates the registry.
pub struct NotificationRouter {
    registry: Arc<SubscriptionRegistry>,
    device_id: String,
    handler: DeliveryHandler,
}

impl NotificationRouter {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        device_id: String,
        handler: DeliveryHandler,
    ) -> Self {
        Self {
            registry,
            device_id,
            handler,
        }
    }

    /// Routes one payload; returns whether it was surfaced.
    pub async fn dispatch(&self, payload: MessagePayload) -> bool {
        let target = RouteTarget::from_payload(&payload);
        let users = self.registry.active_users().await;
        let deliver = match &target {
            RouteTarget::Broadcast => !users.is_empty(),
            RouteTarget::User(id) => users.iter().any(|user| &user.user_id == id),
            RouteTarget::Role(kind) => users.iter().any(|user| user.user_type == *kind),
            RouteTarget::Invalid => false,
        };
        if deliver {
            (self.handler)(payload, &self.device_id);
        } else {
            debug!("Suppressed push payload for inactive target {target:?}");
        }
        deliver
    }
}
