use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use percent_encoding::{percent_encode, NON_ALPHANUMERIC};

use crate::error::{storage_unavailable, PushResult};

/// Persistent local key-value store consumed by the device identity store and
/// the subscription registry. Implementations must tolerate concurrent access.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> PushResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> PushResult<()>;
}

/// Process-lifetime store, used in tests and by embedders that persist
/// elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> PushResult<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> PushResult<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// File-backed store: one percent-encoded file per key under a base
/// directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    pub fn new(base_dir: PathBuf) -> PushResult<Self> {
        fs::create_dir_all(&base_dir).map_err(|err| {
            storage_unavailable(format!(
                "Failed to create store directory '{}': {}",
                base_dir.display(),
                err
            ))
        })?;
        Ok(Self { base_dir })
    }

    fn file_for(&self, key: &str) -> PathBuf {
        let encoded = percent_encode(key.as_bytes(), NON_ALPHANUMERIC).to_string();
        self.base_dir.join(format!("{encoded}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> PushResult<Option<String>> {
        let path = self.file_for(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path).map(Some).map_err(|err| {
            storage_unavailable(format!("Failed to read '{}': {}", path.display(), err))
        })
    }

    fn set(&self, key: &str, value: &str) -> PushResult<()> {
        let path = self.file_for(key);
        fs::write(&path, value).map_err(|err| {
            storage_unavailable(format!("Failed to write '{}': {}", path.display(), err))
        })
    }
}
