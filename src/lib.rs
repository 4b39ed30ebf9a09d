//! Device-scoped push notification registration and multi-identity routing.
//!
//! One physical device can host several logged-in identities (customer,
//! provider, admin) at once. This crate owns the lifecycle state that makes
//! that work: the stable device identifier, the platform push token and its
//! rotation, the authoritative local set of active identities and its
//! persistence, the decision whether an inbound payload should be surfaced,
//! and reconciliation of local state against the backend registration
//! service.
//!
//! The subsystem is constructed explicitly via [`PushService`] with injected
//! collaborators (a [`PushPlatform`] capability, a [`KeyValueStore`], and a
//! [`RegistrationGateway`]) and torn down with an explicit `shutdown`.
//! Rendering of notifications and retry policy for gateway calls are out of
//! scope: delivery is pure dispatch to an external handler, and callers own
//! retries.

pub mod clock;
pub mod constants;
pub mod device;
pub mod error;
pub mod gateway;
pub mod platform;
pub mod reconcile;
pub mod registry;
pub mod router;
pub mod service;
pub mod storage;
pub mod token;
pub mod types;

#[cfg(test)]
pub mod test_support;

pub use clock::{Clock, SystemClock};
pub use device::DeviceIdentityStore;
pub use error::{PushError, PushErrorCode, PushResult};
pub use gateway::{RegistrationGateway, RestGateway, VerifyResponse};
pub use platform::{DeliveryContext, PermissionState, PushPlatform};
pub use reconcile::{ReconciliationResult, ReconciliationService};
pub use registry::SubscriptionRegistry;
pub use router::{NotificationRouter, RouteTarget};
pub use service::PushService;
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use token::{PushTokenManager, TokenState};
pub use types::{
    topics_for, ClientInfo, DeliveryHandler, DeviceToken, MessageHandler, MessagePayload,
    NotificationPayload, Unsubscribe, UserInfo, UserSubscription, UserType,
};
