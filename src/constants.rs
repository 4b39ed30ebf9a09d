/// Key under which the stable device identifier is persisted.
pub const DEVICE_ID_KEY: &str = "push_device_id";

/// Key under which the subscription snapshot is persisted.
pub const SUBSCRIPTIONS_KEY: &str = "push_subscriptions";

/// Minimum interval between token freshness checks.
pub const TOKEN_VALIDATION_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;

/// Client-level timeout applied to every gateway request.
pub const GATEWAY_TIMEOUT_MS: u64 = 10_000;

pub const SESSION_ID_LEN: usize = 24;
pub const DEVICE_ID_RANDOM_LEN: usize = 12;

pub const DEFAULT_API_URL: &str = "https://api.pushregistry.dev/v1";
pub const API_URL_ENV: &str = "PUSH_REGISTRY_API_URL";
