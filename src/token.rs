use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_lock::Mutex;
use log::{debug, warn};
use once_cell::sync::OnceCell;

use crate::clock::Clock;
use crate::constants::TOKEN_VALIDATION_INTERVAL_MS;
use crate::device::DeviceIdentityStore;
use crate::error::{
    capability_unsupported, permission_denied, token_acquisition_failed, PushErrorCode, PushResult,
};
use crate::gateway::RegistrationGateway;
use crate::platform::{DeliveryContext, PermissionState, PushPlatform};
use crate::registry::SubscriptionRegistry;
use crate::types::{ClientInfo, DeviceToken, MessageHandler, Unsubscribe};

/// Lifecycle of the device's push credential.
#[derive(Clone, Debug)]
pub enum TokenState {
    Uninitialized,
    Initializing,
    Ready(DeviceToken),
    Rotating {
        current: DeviceToken,
        next: DeviceToken,
    },
    Failed(PushErrorCode),
}

struct ManagerState {
    state: TokenState,
    context: Option<DeliveryContext>,
    listener: Option<Unsubscribe>,
    last_validation_ms: u64,
}

/// Acquires, validates, and rotates the device's push token. Exactly one
/// foreground-message listener is installed; inbound payloads are forwarded
/// to the attached sink, never routed here.
pub struct PushTokenManager {
    platform: Arc<dyn PushPlatform>,
    gateway: Arc<dyn RegistrationGateway>,
    device: Arc<DeviceIdentityStore>,
    clock: Arc<dyn Clock>,
    client: ClientInfo,
    state: Mutex<ManagerState>,
    registry: OnceCell<Weak<SubscriptionRegistry>>,
    forward: Arc<OnceCell<MessageHandler>>,
    timer: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    closed: AtomicBool,
}

impl PushTokenManager {
    pub fn new(
        platform: Arc<dyn PushPlatform>,
        gateway: Arc<dyn RegistrationGateway>,
        device: Arc<DeviceIdentityStore>,
        clock: Arc<dyn Clock>,
        client: ClientInfo,
    ) -> Self {
        Self {
            platform,
            gateway,
            device,
            clock,
            client,
            state: Mutex::new(ManagerState {
                state: TokenState::Uninitialized,
                context: None,
                listener: None,
                last_validation_ms: 0,
            }),
            registry: OnceCell::new(),
            forward: Arc::new(OnceCell::new()),
            timer: std::sync::Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Wires the registry the rotation sweep re-registers through. Held as a
    /// `Weak` backref; the composition root owns the strong side.
    pub fn attach_registry(&self, registry: &Arc<SubscriptionRegistry>) {
        let _ = self.registry.set(Arc::downgrade(registry));
    }

    /// Sets the sink the foreground listener forwards payloads to. Must be
    /// attached before `initialize`; payloads arriving earlier are dropped.
    pub fn set_message_sink(&self, handler: MessageHandler) {
        let _ = self.forward.set(handler);
    }

    /// Acquires the push token. The state mutex is held across the whole
    /// acquisition, so a concurrent double-call observes `Ready` and returns
    /// the already-acquired token; exactly one listener is ever installed.
    pub async fn initialize(&self) -> PushResult<DeviceToken> {
        let mut guard = self.state.lock().await;
        match &guard.state {
            TokenState::Ready(token) => return Ok(token.clone()),
            TokenState::Rotating { next, .. } => return Ok(next.clone()),
            _ => {}
        }
        guard.state = TokenState::Initializing;
        match self.acquire(&mut guard).await {
            Ok(token) => {
                guard.state = TokenState::Ready(token.clone());
                guard.last_validation_ms = self.clock.now_ms();
                Ok(token)
            }
            Err(err) => {
                guard.state = TokenState::Failed(err.code);
                Err(err)
            }
        }
    }

    async fn acquire(&self, guard: &mut ManagerState) -> PushResult<DeviceToken> {
        if !self.platform.is_supported() {
            return Err(capability_unsupported(
                "Push delivery is not supported on this platform",
            ));
        }

        match self.platform.request_permission().await? {
            PermissionState::Granted => {}
            PermissionState::Denied | PermissionState::Default => {
                return Err(permission_denied(
                    "Notification permission was not granted by the user",
                ));
            }
        }

        let context = self.platform.register_delivery_context().await?;
        let device_id = self.device.get_or_create_device_id();
        let raw = self.platform.get_token(&context, &device_id).await?;
        if raw.trim().is_empty() {
            return Err(token_acquisition_failed("Provider returned an empty token"));
        }

        if guard.listener.is_none() {
            let forward = Arc::clone(&self.forward);
            let handler: MessageHandler = Arc::new(move |payload| {
                if let Some(sink) = forward.get() {
                    sink(payload);
                } else {
                    debug!("Dropping foreground push payload: no sink attached");
                }
            });
            guard.listener = Some(self.platform.subscribe_foreground(handler)?);
        }
        guard.context = Some(context);

        Ok(DeviceToken {
            token: raw,
            device_id,
            browser: self.client.browser.clone(),
            platform: self.client.platform.clone(),
            user_agent: self.client.user_agent.clone(),
            registered_at: self.clock.now_ms(),
        })
    }

    /// Returns the held token, if any, without triggering initialization.
    /// During rotation the incoming token is the valid one.
    pub async fn current_token(&self) -> Option<DeviceToken> {
        match &self.state.lock().await.state {
            TokenState::Ready(token) => Some(token.clone()),
            TokenState::Rotating { next, .. } => Some(next.clone()),
            _ => None,
        }
    }

    /// Token used by lazy registration paths: hands out the held token or
    /// performs the one-time initialization.
    pub async fn ensure_ready(&self) -> PushResult<DeviceToken> {
        if let Some(token) = self.current_token().await {
            return Ok(token);
        }
        self.initialize().await
    }

    /// Checks whether the platform still hands out the held token and
    /// rotates if not. Skips when the last check is within the interval; the
    /// validation stamp is written before the provider call so failures are
    /// rate-limited too.
    pub async fn validate_freshness(&self) -> PushResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }

        let (current, context) = {
            let mut guard = self.state.lock().await;
            let now = self.clock.now_ms();
            if guard.last_validation_ms != 0
                && now.saturating_sub(guard.last_validation_ms) < TOKEN_VALIDATION_INTERVAL_MS
            {
                return Ok(());
            }
            guard.last_validation_ms = now;
            let current = match &guard.state {
                TokenState::Ready(token) => token.clone(),
                _ => return Ok(()),
            };
            let context = match guard.context.clone() {
                Some(context) => context,
                None => return Ok(()),
            };
            (current, context)
        };

        let fresh = match self.platform.get_token(&context, &current.device_id).await {
            Ok(token) => token,
            Err(err) => {
                warn!("Token freshness check failed: {err}");
                return Err(err);
            }
        };

        if fresh == current.token {
            debug!("Push token is still current");
            return Ok(());
        }

        let next = DeviceToken {
            token: fresh,
            registered_at: self.clock.now_ms(),
            ..current.clone()
        };
        {
            let mut guard = self.state.lock().await;
            guard.state = TokenState::Rotating {
                current: current.clone(),
                next: next.clone(),
            };
        }
        self.handle_rotation(current, next).await
    }

    /// Replaces the held token: re-registers every active identity with the
    /// new one (a failure for one identity never aborts the others), then
    /// best-effort deactivates the old token.
    pub async fn handle_rotation(&self, old: DeviceToken, next: DeviceToken) -> PushResult<()> {
        debug!("Rotating push token for device {}", old.device_id);

        let mut cleanup_user_id = String::new();
        if let Some(registry) = self.registry.get().and_then(Weak::upgrade) {
            let survivors = registry.reregister_active(&next).await;
            debug!("Re-registered {survivors} identities with the rotated token");
            if let Some(first) = registry.active_users().await.into_iter().next() {
                cleanup_user_id = first.user_id;
            }
        }

        match self
            .gateway
            .deactivate_token(&old.token, &old.device_id, &cleanup_user_id)
            .await
        {
            Ok(count) => debug!("Deactivated {count} stale token records"),
            Err(err) => warn!("Failed to deactivate the replaced push token: {err}"),
        }

        if self.closed.load(Ordering::SeqCst) {
            debug!("Manager was shut down during rotation; discarding the state update");
            return Ok(());
        }
        let mut guard = self.state.lock().await;
        guard.state = TokenState::Ready(next);
        Ok(())
    }

    /// Starts the periodic freshness check. Idempotent; the task stops on
    /// `shutdown`.
    pub fn spawn_validation_timer(self: Arc<Self>) {
        let mut slot = self.timer.lock().unwrap();
        if slot.is_some() {
            return;
        }
        let manager = Arc::clone(&self);
        *slot = Some(tokio::spawn(async move {
            let period = Duration::from_millis(TOKEN_VALIDATION_INTERVAL_MS);
            loop {
                tokio::time::sleep(period).await;
                if manager.closed.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(err) = manager.validate_freshness().await {
                    warn!("Periodic token validation failed: {err}");
                }
            }
        }));
    }

    /// Cancels the validation timer and removes the foreground listener.
    /// Does not revoke the token; revocation is a distinct, explicit action.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(handle) = self.timer.lock().unwrap().take() {
            handle.abort();
        }
        let mut guard = self.state.lock().await;
        if let Some(unsubscribe) = guard.listener.take() {
            unsubscribe();
        }
    }
}
