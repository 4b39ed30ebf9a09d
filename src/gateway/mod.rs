mod rest;

pub use rest::RestGateway;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::PushResult;
use crate::types::{DeviceToken, MessagePayload, UserSubscription, UserType};

/// Backend answer to a subscription verification probe.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifyResponse {
    pub exists: bool,
    pub should_re_register: bool,
}

/// Network boundary to the backend registration service. None of these calls
/// retry internally; callers own retry policy.
#[async_trait]
pub trait RegistrationGateway: Send + Sync {
    /// Registers one identity with the given token and topic set.
    async fn register(
        &self,
        token: &DeviceToken,
        subscription: &UserSubscription,
        topics: &[String],
    ) -> PushResult<()>;

    async fn unregister(&self, device_id: &str, user_id: &str, token: &str) -> PushResult<()>;

    /// Asks the backend whether it still holds a live record for the user.
    async fn verify(&self, user_id: &str, user_type: UserType) -> PushResult<VerifyResponse>;

    /// Requests deactivation of a replaced token; returns the number of
    /// token records the backend deactivated.
    async fn deactivate_token(
        &self,
        old_token: &str,
        device_id: &str,
        user_id: &str,
    ) -> PushResult<u32>;

    async fn send_test(
        &self,
        target_user_id: Option<&str>,
        target_user_type: Option<UserType>,
        payload: &MessagePayload,
    ) -> PushResult<()>;
}
