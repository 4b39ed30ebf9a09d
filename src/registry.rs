use std::collections::HashMap;
use std::sync::Arc;

use async_lock::Mutex;
use log::{debug, warn};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::clock::Clock;
use crate::constants::{SESSION_ID_LEN, SUBSCRIPTIONS_KEY};
use crate::error::PushResult;
use crate::gateway::RegistrationGateway;
use crate::storage::KeyValueStore;
use crate::token::PushTokenManager;
use crate::types::{topics_for, DeviceToken, UserInfo, UserSubscription, UserType};

struct RegistryState {
    users: HashMap<String, UserSubscription>,
}

/// The authoritative local mapping of active identities on this device.
///
/// Every mutation runs under a single mutex that is held across the gateway
/// call, so a user-triggered registration and the rotation re-registration
/// sweep cannot interleave. Lock order is manager state before registry
/// state on every path.
pub struct SubscriptionRegistry {
    manager: Arc<PushTokenManager>,
    gateway: Arc<dyn RegistrationGateway>,
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    state: Mutex<RegistryState>,
}

impl SubscriptionRegistry {
    pub fn new(
        manager: Arc<PushTokenManager>,
        gateway: Arc<dyn RegistrationGateway>,
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            manager,
            gateway,
            storage,
            clock,
            state: Mutex::new(RegistryState {
                users: HashMap::new(),
            }),
        }
    }

    /// Loads the persisted snapshot. Called once at process start; an
    /// unreadable snapshot is discarded, not fatal.
    pub async fn load_snapshot(&self) {
        let mut state = self.state.lock().await;
        match self.storage.get(SUBSCRIPTIONS_KEY) {
            Ok(Some(json)) => match serde_json::from_str::<Vec<UserSubscription>>(&json) {
                Ok(subscriptions) => {
                    state.users = subscriptions
                        .into_iter()
                        .map(|subscription| (subscription.user_id.clone(), subscription))
                        .collect();
                    debug!("Loaded {} persisted subscriptions", state.users.len());
                }
                Err(err) => warn!("Discarding unreadable subscription snapshot: {err}"),
            },
            Ok(None) => {}
            Err(err) => warn!("Subscription snapshot unavailable: {err}"),
        }
    }

    fn persist(&self, state: &RegistryState) {
        let mut subscriptions: Vec<&UserSubscription> = state.users.values().collect();
        subscriptions.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        match serde_json::to_string(&subscriptions) {
            Ok(json) => {
                if let Err(err) = self.storage.set(SUBSCRIPTIONS_KEY, &json) {
                    warn!("Failed to persist the subscription snapshot: {err}");
                }
            }
            Err(err) => warn!("Failed to serialize the subscription snapshot: {err}"),
        }
    }

    /// Registers an identity on this device. Local state is only committed
    /// after the gateway confirms; on failure the mapping is left untouched.
    /// Re-registering an already-active id overwrites it with a fresh
    /// session.
    pub async fn register_user(
        &self,
        user_id: &str,
        user_type: UserType,
        info: UserInfo,
    ) -> PushResult<()> {
        let token = self.manager.ensure_ready().await?;
        let mut state = self.state.lock().await;
        let subscription = UserSubscription {
            user_id: user_id.to_string(),
            user_type,
            email: info.email,
            name: info.name,
            active_session_id: generate_session_id(),
            last_active: self.clock.now_ms(),
        };
        let topics = topics_for(&subscription, &token.device_id);
        self.gateway
            .register(&token, &subscription, &topics)
            .await?;
        state.users.insert(subscription.user_id.clone(), subscription);
        self.persist(&state);
        Ok(())
    }

    /// Removes an identity. Local removal is the guaranteed contract: the
    /// backend call is attempted first but its failure is logged, not
    /// returned. No-op success when the id is not active.
    pub async fn unregister_user(&self, user_id: &str) -> PushResult<()> {
        let token = self.manager.current_token().await;
        let mut state = self.state.lock().await;
        if !state.users.contains_key(user_id) {
            return Ok(());
        }
        if let Some(token) = token {
            if let Err(err) = self
                .gateway
                .unregister(&token.device_id, user_id, &token.token)
                .await
            {
                warn!("Backend unregistration for {user_id} failed; removing locally anyway: {err}");
            }
        }
        state.users.remove(user_id);
        self.persist(&state);
        Ok(())
    }

    /// Purely local activity ping; no network call, no-op when absent.
    pub async fn update_activity(&self, user_id: &str) {
        let mut state = self.state.lock().await;
        if let Some(subscription) = state.users.get_mut(user_id) {
            subscription.last_active = self.clock.now_ms();
        } else {
            return;
        }
        self.persist(&state);
    }

    /// Immutable snapshot of the active identities, ordered by user id.
    pub async fn active_users(&self) -> Vec<UserSubscription> {
        let state = self.state.lock().await;
        let mut users: Vec<UserSubscription> = state.users.values().cloned().collect();
        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        users
    }

    pub async fn contains(&self, user_id: &str) -> bool {
        self.state.lock().await.users.contains_key(user_id)
    }

    /// Removes a local entry without a backend call. Used when reconciliation
    /// finds the backend no longer recognizes the id.
    pub(crate) async fn remove_local(&self, user_id: &str) -> bool {
        let mut state = self.state.lock().await;
        let removed = state.users.remove(user_id).is_some();
        if removed {
            self.persist(&state);
        }
        removed
    }

    /// Inserts a reconstructed entry without a backend call. Used when the
    /// backend already reflects the registration.
    pub(crate) async fn insert_local(&self, subscription: UserSubscription) {
        let mut state = self.state.lock().await;
        state.users.insert(subscription.user_id.clone(), subscription);
        self.persist(&state);
    }

    /// The rotation sweep: re-registers every active identity with the new
    /// token, holding the registry lock for the whole pass. A failure for
    /// one identity is logged and the sweep continues. Returns the number of
    /// identities re-registered.
    pub(crate) async fn reregister_active(&self, token: &DeviceToken) -> usize {
        let state = self.state.lock().await;
        let mut survivors = 0;
        for subscription in state.users.values() {
            let topics = topics_for(subscription, &token.device_id);
            match self.gateway.register(token, subscription, &topics).await {
                Ok(()) => survivors += 1,
                Err(err) => warn!(
                    "Re-registration of {} with the rotated token failed: {err}",
                    subscription.user_id
                ),
            }
        }
        survivors
    }
}

pub(crate) fn generate_session_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .map(char::from)
        .take(SESSION_ID_LEN)
        .collect()
}
