//! Mock collaborators and pre-wired component rigs shared across the
//! crate's unit tests.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::clock::Clock;
use crate::device::DeviceIdentityStore;
use crate::error::{gateway_rejected, gateway_unreachable, provider_unavailable, PushResult};
use crate::gateway::{RegistrationGateway, VerifyResponse};
use crate::platform::{DeliveryContext, PermissionState, PushPlatform};
use crate::registry::SubscriptionRegistry;
use crate::service::PushService;
use crate::storage::MemoryStore;
use crate::token::PushTokenManager;
use crate::types::{
    ClientInfo, DeviceToken, MessageHandler, MessagePayload, Unsubscribe, UserSubscription,
    UserType,
};

/// Scriptable platform capability: permission state, current token, and a
/// captured foreground handler for emitting payloads into the pipeline.
pub struct MockPlatform {
    current_token: Mutex<String>,
    permission: Mutex<PermissionState>,
    supported: AtomicBool,
    failing: AtomicBool,
    pub token_requests: AtomicUsize,
    pub listeners_installed: AtomicUsize,
    handler: Mutex<Option<MessageHandler>>,
}

impl MockPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            current_token: Mutex::new("tok-1".to_string()),
            permission: Mutex::new(PermissionState::Granted),
            supported: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            token_requests: AtomicUsize::new(0),
            listeners_installed: AtomicUsize::new(0),
            handler: Mutex::new(None),
        })
    }

    pub fn set_current_token(&self, token: &str) {
        *self.current_token.lock().unwrap() = token.to_string();
    }

    pub fn set_permission(&self, state: PermissionState) {
        *self.permission.lock().unwrap() = state;
    }

    pub fn set_supported(&self, supported: bool) {
        self.supported.store(supported, Ordering::SeqCst);
    }

    pub fn fail_get_token(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delivers a payload through the captured foreground listener.
    pub fn emit(&self, payload: MessagePayload) {
        let handler = self.handler.lock().unwrap().clone();
        if let Some(handler) = handler {
            handler(payload);
        }
    }
}

#[async_trait]
impl PushPlatform for MockPlatform {
    fn is_supported(&self) -> bool {
        self.supported.load(Ordering::SeqCst)
    }

    async fn request_permission(&self) -> PushResult<PermissionState> {
        Ok(*self.permission.lock().unwrap())
    }

    async fn register_delivery_context(&self) -> PushResult<DeliveryContext> {
        Ok(DeliveryContext {
            handle: "ctx-1".to_string(),
        })
    }

    async fn get_token(&self, _context: &DeliveryContext, _device_id: &str) -> PushResult<String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(provider_unavailable("scripted provider outage"));
        }
        self.token_requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.current_token.lock().unwrap().clone())
    }

    fn subscribe_foreground(&self, handler: MessageHandler) -> PushResult<Unsubscribe> {
        self.listeners_installed.fetch_add(1, Ordering::SeqCst);
        *self.handler.lock().unwrap() = Some(handler);
        Ok(Box::new(|| {}))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayCall {
    Register {
        token: String,
        user_id: String,
        topics: Vec<String>,
    },
    Unregister {
        device_id: String,
        user_id: String,
        token: String,
    },
    Verify {
        user_id: String,
    },
    Deactivate {
        old_token: String,
        device_id: String,
        user_id: String,
    },
    SendTest {
        target_user_id: Option<String>,
    },
}

/// Records every call and supports per-user and per-operation failure
/// injection.
pub struct RecordingGateway {
    calls: Mutex<Vec<GatewayCall>>,
    failing_register: Mutex<Vec<String>>,
    failing_unregister: AtomicBool,
    failing_verify: AtomicBool,
    verify_response: Mutex<VerifyResponse>,
}

impl RecordingGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            failing_register: Mutex::new(Vec::new()),
            failing_unregister: AtomicBool::new(false),
            failing_verify: AtomicBool::new(false),
            verify_response: Mutex::new(VerifyResponse::default()),
        })
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn fail_register_for(&self, user_id: &str) {
        self.failing_register
            .lock()
            .unwrap()
            .push(user_id.to_string());
    }

    pub fn fail_unregister(&self, failing: bool) {
        self.failing_unregister.store(failing, Ordering::SeqCst);
    }

    pub fn fail_verify(&self, failing: bool) {
        self.failing_verify.store(failing, Ordering::SeqCst);
    }

    pub fn set_verify(&self, exists: bool, should_re_register: bool) {
        *self.verify_response.lock().unwrap() = VerifyResponse {
            exists,
            should_re_register,
        };
    }

    /// User ids of all recorded register calls, in order.
    pub fn registered_user_ids(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                GatewayCall::Register { user_id, .. } => Some(user_id.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl RegistrationGateway for RecordingGateway {
    async fn register(
        &self,
        token: &DeviceToken,
        subscription: &UserSubscription,
        topics: &[String],
    ) -> PushResult<()> {
        if self
            .failing_register
            .lock()
            .unwrap()
            .contains(&subscription.user_id)
        {
            return Err(gateway_rejected(format!(
                "scripted rejection for {}",
                subscription.user_id
            )));
        }
        self.calls.lock().unwrap().push(GatewayCall::Register {
            token: token.token.clone(),
            user_id: subscription.user_id.clone(),
            topics: topics.to_vec(),
        });
        Ok(())
    }

    async fn unregister(&self, device_id: &str, user_id: &str, token: &str) -> PushResult<()> {
        self.calls.lock().unwrap().push(GatewayCall::Unregister {
            device_id: device_id.to_string(),
            user_id: user_id.to_string(),
            token: token.to_string(),
        });
        if self.failing_unregister.load(Ordering::SeqCst) {
            return Err(gateway_unreachable("scripted unregister outage"));
        }
        Ok(())
    }

    async fn verify(&self, user_id: &str, _user_type: UserType) -> PushResult<VerifyResponse> {
        if self.failing_verify.load(Ordering::SeqCst) {
            return Err(gateway_unreachable("scripted verify outage"));
        }
        self.calls.lock().unwrap().push(GatewayCall::Verify {
            user_id: user_id.to_string(),
        });
        Ok(*self.verify_response.lock().unwrap())
    }

    async fn deactivate_token(
        &self,
        old_token: &str,
        device_id: &str,
        user_id: &str,
    ) -> PushResult<u32> {
        self.calls.lock().unwrap().push(GatewayCall::Deactivate {
            old_token: old_token.to_string(),
            device_id: device_id.to_string(),
            user_id: user_id.to_string(),
        });
        Ok(1)
    }

    async fn send_test(
        &self,
        target_user_id: Option<&str>,
        _target_user_type: Option<UserType>,
        _payload: &MessagePayload,
    ) -> PushResult<()> {
        self.calls.lock().unwrap().push(GatewayCall::SendTest {
            target_user_id: target_user_id.map(str::to_string),
        });
        Ok(())
    }
}

/// Manually advanced clock for deterministic interval tests.
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            now: AtomicU64::new(start_ms),
        })
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Manager + registry wired the way the composition root wires them, over
/// mock collaborators.
pub struct CoreRig {
    pub platform: Arc<MockPlatform>,
    pub gateway: Arc<RecordingGateway>,
    pub storage: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub manager: Arc<PushTokenManager>,
    pub registry: Arc<SubscriptionRegistry>,
}

pub fn core_rig() -> CoreRig {
    core_rig_with(Arc::new(MemoryStore::new()))
}

pub fn core_rig_with(storage: Arc<MemoryStore>) -> CoreRig {
    let platform = MockPlatform::new();
    let gateway = RecordingGateway::new();
    let clock = ManualClock::new(1_000);
    let device = Arc::new(DeviceIdentityStore::new(storage.clone()));
    let manager = Arc::new(PushTokenManager::new(
        platform.clone(),
        gateway.clone(),
        device,
        clock.clone(),
        ClientInfo::default(),
    ));
    let registry = Arc::new(SubscriptionRegistry::new(
        manager.clone(),
        gateway.clone(),
        storage.clone(),
        clock.clone(),
    ));
    manager.attach_registry(&registry);
    CoreRig {
        platform,
        gateway,
        storage,
        clock,
        manager,
        registry,
    }
}

/// Fully-wired `PushService` over mock collaborators, with a recording
/// delivery sink.
pub struct ServiceRig {
    pub platform: Arc<MockPlatform>,
    pub gateway: Arc<RecordingGateway>,
    pub storage: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub service: Arc<PushService>,
    pub delivered: Arc<Mutex<Vec<MessagePayload>>>,
}

pub fn service_rig() -> ServiceRig {
    service_rig_with(Arc::new(MemoryStore::new()))
}

pub fn service_rig_with(storage: Arc<MemoryStore>) -> ServiceRig {
    let platform = MockPlatform::new();
    let gateway = RecordingGateway::new();
    let clock = ManualClock::new(1_000);
    let delivered: Arc<Mutex<Vec<MessagePayload>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = delivered.clone();
    let service = PushService::with_clock(
        platform.clone(),
        storage.clone(),
        gateway.clone(),
        Arc::new(move |payload, _device_id: &str| {
            sink.lock().unwrap().push(payload);
        }),
        clock.clone(),
        ClientInfo::default(),
    );
    ServiceRig {
        platform,
        gateway,
        storage,
        clock,
        service,
        delivered,
    }
}
