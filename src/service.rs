use std::sync::Arc;

use async_lock::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::device::DeviceIdentityStore;
use crate::error::PushResult;
use crate::gateway::RegistrationGateway;
use crate::platform::PushPlatform;
use crate::reconcile::{ReconciliationResult, ReconciliationService};
use crate::registry::SubscriptionRegistry;
use crate::router::NotificationRouter;
use crate::storage::KeyValueStore;
use crate::token::PushTokenManager;
use crate::types::{
    ClientInfo, DeliveryHandler, DeviceToken, MessagePayload, UserInfo, UserSubscription, UserType,
};

/// Composition root of the push subsystem: one explicitly constructed
/// instance per device process, with injected collaborators and explicit
/// init/shutdown. Multiple isolated instances can coexist under test.
pub struct PushService {
    device: Arc<DeviceIdentityStore>,
    manager: Arc<PushTokenManager>,
    registry: Arc<SubscriptionRegistry>,
    router: Arc<NotificationRouter>,
    reconciler: ReconciliationService,
    gateway: Arc<dyn RegistrationGateway>,
    initialized: Mutex<bool>,
}

impl PushService {
    pub fn new(
        platform: Arc<dyn PushPlatform>,
        storage: Arc<dyn KeyValueStore>,
        gateway: Arc<dyn RegistrationGateway>,
        delivery: DeliveryHandler,
    ) -> Arc<Self> {
        Self::with_clock(
            platform,
            storage,
            gateway,
            delivery,
            Arc::new(SystemClock),
            ClientInfo::default(),
        )
    }

    pub fn with_clock(
        platform: Arc<dyn PushPlatform>,
        storage: Arc<dyn KeyValueStore>,
        gateway: Arc<dyn RegistrationGateway>,
        delivery: DeliveryHandler,
        clock: Arc<dyn Clock>,
        client: ClientInfo,
    ) -> Arc<Self> {
        let device = Arc::new(DeviceIdentityStore::new(storage.clone()));
        let manager = Arc::new(PushTokenManager::new(
            platform,
            gateway.clone(),
            device.clone(),
            clock.clone(),
            client,
        ));
        let registry = Arc::new(SubscriptionRegistry::new(
            manager.clone(),
            gateway.clone(),
            storage,
            clock.clone(),
        ));
        manager.attach_registry(&registry);

        let device_id = device.get_or_create_device_id();
        let router = Arc::new(NotificationRouter::new(
            registry.clone(),
            device_id,
            delivery,
        ));
        {
            // Foreground payloads arrive on the runtime; routing needs the
            // registry lock, so it runs as a task.
            let router = router.clone();
            manager.set_message_sink(Arc::new(move |payload| {
                let router = router.clone();
                tokio::spawn(async move {
                    router.dispatch(payload).await;
                });
            }));
        }

        let reconciler = ReconciliationService::new(
            registry.clone(),
            gateway.clone(),
            manager.clone(),
            clock,
        );

        Arc::new(Self {
            device,
            manager,
            registry,
            router,
            reconciler,
            gateway,
            initialized: Mutex::new(false),
        })
    }

    /// Loads persisted state, acquires the token, and starts the periodic
    /// freshness check. Idempotent; a failed first call can be retried.
    pub async fn init(&self) -> PushResult<DeviceToken> {
        let mut initialized = self.initialized.lock().await;
        if *initialized {
            return self.manager.ensure_ready().await;
        }
        self.registry.load_snapshot().await;
        let token = self.manager.initialize().await?;
        // Startup validation: skips immediately after acquisition, but keeps
        // the contract that every startup runs a freshness pass.
        let _ = self.manager.validate_freshness().await;
        self.manager.clone().spawn_validation_timer();
        *initialized = true;
        Ok(token)
    }

    pub async fn shutdown(&self) {
        let mut initialized = self.initialized.lock().await;
        self.manager.shutdown().await;
        *initialized = false;
    }

    pub async fn register_user(
        &self,
        user_id: &str,
        user_type: UserType,
        info: UserInfo,
    ) -> PushResult<()> {
        self.registry.register_user(user_id, user_type, info).await
    }

    pub async fn unregister_user(&self, user_id: &str) -> PushResult<()> {
        self.registry.unregister_user(user_id).await
    }

    pub async fn update_activity(&self, user_id: &str) {
        self.registry.update_activity(user_id).await
    }

    pub async fn active_users(&self) -> Vec<UserSubscription> {
        self.registry.active_users().await
    }

    /// Routes an externally received payload; returns whether it was
    /// surfaced.
    pub async fn dispatch(&self, payload: MessagePayload) -> bool {
        self.router.dispatch(payload).await
    }

    pub async fn verify(&self, user_id: &str, user_type: UserType) -> ReconciliationResult {
        self.reconciler.verify(user_id, user_type).await
    }

    pub async fn restore_from_database(
        &self,
        user_id: &str,
        user_type: UserType,
    ) -> PushResult<bool> {
        self.reconciler.restore_from_database(user_id, user_type).await
    }

    pub async fn send_test(
        &self,
        target_user_id: Option<&str>,
        target_user_type: Option<UserType>,
        payload: &MessagePayload,
    ) -> PushResult<()> {
        self.gateway
            .send_test(target_user_id, target_user_type, payload)
            .await
    }

    pub fn device_id(&self) -> String {
        self.device.get_or_create_device_id()
    }

    pub async fn current_token(&self) -> Option<DeviceToken> {
        self.manager.current_token().await
    }
}
