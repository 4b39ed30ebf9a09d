use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{API_URL_ENV, DEFAULT_API_URL, GATEWAY_TIMEOUT_MS};
use crate::error::{gateway_rejected, gateway_unreachable, invalid_argument, PushResult};
use crate::gateway::{RegistrationGateway, VerifyResponse};
use crate::types::{DeviceToken, MessagePayload, UserSubscription, UserType};

const BODY_EXCERPT_LEN: usize = 200;

/// REST implementation of the registration gateway. Every request carries
/// the client-level timeout; nothing here blocks indefinitely.
#[derive(Clone, Debug)]
pub struct RestGateway {
    http: Client,
    base_url: Url,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBody<'a> {
    device_token: &'a DeviceToken,
    user_subscription: &'a UserSubscription,
    topics: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnregisterBody<'a> {
    device_id: &'a str,
    user_id: &'a str,
    token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyBody<'a> {
    user_id: &'a str,
    user_type: UserType,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CleanupBody<'a> {
    old_token: &'a str,
    device_id: &'a str,
    user_id: &'a str,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct CleanupResponse {
    deactivated_tokens: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendTestBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    target_user_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_user_type: Option<UserType>,
    payload: &'a MessagePayload,
}

impl RestGateway {
    pub fn new() -> PushResult<Self> {
        let base = std::env::var(API_URL_ENV).unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self::with_base_url(&base)
    }

    pub fn with_base_url(base_url: &str) -> PushResult<Self> {
        let base_url = Url::parse(base_url).map_err(|err| {
            invalid_argument(format!("Invalid registration endpoint '{base_url}': {err}"))
        })?;
        let http = Client::builder()
            .user_agent(format!("push-registry/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_millis(GATEWAY_TIMEOUT_MS))
            .build()
            .map_err(|err| gateway_unreachable(format!("Failed to build HTTP client: {err}")))?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, segment: &str) -> PushResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| invalid_argument("Registration endpoint is not a base URL"))?;
            segments.push(segment);
        }
        Ok(url)
    }

    async fn post<B: Serialize>(&self, operation: &str, segment: &str, body: &B) -> PushResult<Response> {
        let url = self.endpoint(segment)?;
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|err| gateway_unreachable(format!("{operation} failed: {err}")))?;
        expect_success(operation, response).await
    }
}

async fn expect_success(operation: &str, response: Response) -> PushResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let mut body = response.text().await.unwrap_or_default();
    body.truncate(BODY_EXCERPT_LEN);
    Err(gateway_rejected(format!(
        "{operation} rejected with {status}: {body}"
    )))
}

#[async_trait]
impl RegistrationGateway for RestGateway {
    async fn register(
        &self,
        token: &DeviceToken,
        subscription: &UserSubscription,
        topics: &[String],
    ) -> PushResult<()> {
        let body = RegisterBody {
            device_token: token,
            user_subscription: subscription,
            topics,
        };
        self.post("Register", "registrations", &body).await?;
        Ok(())
    }

    async fn unregister(&self, device_id: &str, user_id: &str, token: &str) -> PushResult<()> {
        let body = UnregisterBody {
            device_id,
            user_id,
            token,
        };
        self.post("Unregister", "registrations:unregister", &body)
            .await?;
        Ok(())
    }

    async fn verify(&self, user_id: &str, user_type: UserType) -> PushResult<VerifyResponse> {
        let body = VerifyBody { user_id, user_type };
        let response = self.post("Verify", "registrations:verify", &body).await?;
        response
            .json()
            .await
            .map_err(|err| gateway_rejected(format!("Invalid verify response: {err}")))
    }

    async fn deactivate_token(
        &self,
        old_token: &str,
        device_id: &str,
        user_id: &str,
    ) -> PushResult<u32> {
        let body = CleanupBody {
            old_token,
            device_id,
            user_id,
        };
        let response = self.post("Cleanup", "registrations:cleanup", &body).await?;
        let parsed: CleanupResponse = response
            .json()
            .await
            .map_err(|err| gateway_rejected(format!("Invalid cleanup response: {err}")))?;
        Ok(parsed.deactivated_tokens)
    }

    async fn send_test(
        &self,
        target_user_id: Option<&str>,
        target_user_type: Option<UserType>,
        payload: &MessagePayload,
    ) -> PushResult<()> {
        let body = SendTestBody {
            target_user_id,
            target_user_type,
            payload,
        };
        self.post("Send test", "messages:test", &body).await?;
        Ok(())
    }
}
