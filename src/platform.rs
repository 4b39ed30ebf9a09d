use async_trait::async_trait;

use crate::error::PushResult;
use crate::types::{MessageHandler, Unsubscribe};

/// Notification permission states as exposed by the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermissionState {
    /// The user has not decided whether to allow notifications.
    Default,
    /// The user granted notification permissions.
    Granted,
    /// The user denied notification permissions.
    Denied,
}

/// Opaque handle to the platform's background delivery context, scoped to
/// the token requested against it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryContext {
    pub handle: String,
}

/// The platform push capability consumed by the token manager. The crate
/// never talks to a concrete push provider directly; embedders supply an
/// implementation for their platform.
#[async_trait]
pub trait PushPlatform: Send + Sync {
    fn is_supported(&self) -> bool {
        true
    }

    /// Requests notification permission, returning the resulting state.
    /// Implementations must be idempotent when permission is already granted.
    async fn request_permission(&self) -> PushResult<PermissionState>;

    async fn register_delivery_context(&self) -> PushResult<DeliveryContext>;

    /// Requests a push token scoped to the delivery context and device.
    async fn get_token(&self, context: &DeliveryContext, device_id: &str) -> PushResult<String>;

    /// Installs a foreground-message listener. The returned handle removes
    /// it again.
    fn subscribe_foreground(&self, handler: MessageHandler) -> PushResult<Unsubscribe>;
}
