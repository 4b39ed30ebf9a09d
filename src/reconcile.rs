use std::sync::Arc;

use log::{debug, warn};

use crate::clock::Clock;
use crate::error::PushResult;
use crate::gateway::RegistrationGateway;
use crate::registry::{generate_session_id, SubscriptionRegistry};
use crate::token::PushTokenManager;
use crate::types::{UserSubscription, UserType};

/// Transient outcome of one verification pass; never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconciliationResult {
    pub local_exists: bool,
    pub database_exists: bool,
    pub should_re_register: bool,
}

/// Reconciles local registry state against backend truth. The backend is
/// authoritative: local state is never trusted alone for delivery decisions
/// once a pass has run against it.
pub struct ReconciliationService {
    registry: Arc<SubscriptionRegistry>,
    gateway: Arc<dyn RegistrationGateway>,
    manager: Arc<PushTokenManager>,
    clock: Arc<dyn Clock>,
}

impl ReconciliationService {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        gateway: Arc<dyn RegistrationGateway>,
        manager: Arc<PushTokenManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            gateway,
            manager,
            clock,
        }
    }

    /// Compares local presence with the backend's answer. A locally-known id
    /// the backend no longer recognizes is purged. A gateway failure is
    /// answered conservatively: re-registration recommended, nothing purged.
    pub async fn verify(&self, user_id: &str, user_type: UserType) -> ReconciliationResult {
        let local_exists = self.registry.contains(user_id).await;
        match self.gateway.verify(user_id, user_type).await {
            Ok(remote) => {
                if local_exists && !remote.exists {
                    warn!("Backend no longer recognizes {user_id}; purging the local entry");
                    self.registry.remove_local(user_id).await;
                }
                ReconciliationResult {
                    local_exists,
                    database_exists: remote.exists,
                    should_re_register: remote.should_re_register
                        || (local_exists && !remote.exists),
                }
            }
            Err(err) => {
                warn!("Verification for {user_id} failed; recommending re-registration: {err}");
                ReconciliationResult {
                    local_exists,
                    database_exists: false,
                    should_re_register: true,
                }
            }
        }
    }

    /// Rebuilds the local entry for a user the backend still has a live
    /// record for, without re-invoking registration. Used after local
    /// storage was cleared while a valid token is still held. Returns false
    /// when no token is held or the backend has no record.
    pub async fn restore_from_database(
        &self,
        user_id: &str,
        user_type: UserType,
    ) -> PushResult<bool> {
        if self.manager.current_token().await.is_none() {
            debug!("Cannot restore {user_id}: no push token is held");
            return Ok(false);
        }
        let remote = self.gateway.verify(user_id, user_type).await?;
        if !remote.exists {
            return Ok(false);
        }
        let subscription = UserSubscription {
            user_id: user_id.to_string(),
            user_type,
            email: None,
            name: None,
            active_session_id: generate_session_id(),
            last_active: self.clock.now_ms(),
        };
        self.registry.insert_local(subscription).await;
        debug!("Restored subscription for {user_id} from the backend record");
        Ok(true)
    }
}
