use std::sync::Arc;

use chrono::Utc;
use log::warn;
use once_cell::sync::OnceCell;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::constants::{DEVICE_ID_KEY, DEVICE_ID_RANDOM_LEN};
use crate::storage::KeyValueStore;

/// Owns the stable per-device identifier. The id is created once on first
/// run and persisted for the device's lifetime; if the store is unavailable
/// the id degrades to process lifetime but stays stable within the process.
pub struct DeviceIdentityStore {
    storage: Arc<dyn KeyValueStore>,
    cached: OnceCell<String>,
}

impl DeviceIdentityStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            cached: OnceCell::new(),
        }
    }

    pub fn get_or_create_device_id(&self) -> String {
        self.cached
            .get_or_init(|| match self.storage.get(DEVICE_ID_KEY) {
                Ok(Some(id)) if !id.is_empty() => id,
                Ok(_) => {
                    let id = generate_device_id();
                    if let Err(err) = self.storage.set(DEVICE_ID_KEY, &id) {
                        warn!("Device id could not be persisted: {err}");
                    }
                    id
                }
                Err(err) => {
                    warn!("Device id store unavailable, using a process-lifetime id: {err}");
                    generate_device_id()
                }
            })
            .clone()
    }
}

fn generate_device_id() -> String {
    let now_ms = Utc::now().timestamp_millis().max(0) as u64;
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .map(char::from)
        .take(DEVICE_ID_RANDOM_LEN)
        .collect();
    format!("dev-{now_ms:x}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{storage_unavailable, PushResult};
    use crate::storage::MemoryStore;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> PushResult<Option<String>> {
            Err(storage_unavailable("scripted outage"))
        }

        fn set(&self, _key: &str, _value: &str) -> PushResult<()> {
            Err(storage_unavailable("scripted outage"))
        }
    }

    #[test]
    fn device_id_is_stable_across_calls() {
        let store = DeviceIdentityStore::new(Arc::new(MemoryStore::new()));
        let first = store.get_or_create_device_id();
        let second = store.get_or_create_device_id();
        assert_eq!(first, second);
        assert!(first.starts_with("dev-"));
    }

    #[test]
    fn device_id_survives_a_restart_through_the_store() {
        let storage: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let first = DeviceIdentityStore::new(storage.clone()).get_or_create_device_id();
        let second = DeviceIdentityStore::new(storage).get_or_create_device_id();
        assert_eq!(first, second);
    }

    #[test]
    fn unavailable_store_degrades_to_a_stable_process_id() {
        let store = DeviceIdentityStore::new(Arc::new(BrokenStore));
        let first = store.get_or_create_device_id();
        let second = store.get_or_create_device_id();
        assert_eq!(first, second);
    }
}
