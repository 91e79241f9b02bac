use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde_json::Value;
use ws_core::ports::{LocalStorePort, StorageError, StoreRead};

/// In-process store with the same quota semantics as the file store.
///
/// Used by tests and by hosts that have no persistent storage.
pub struct InMemoryLocalStore {
    entries: Mutex<BTreeMap<String, Value>>,
    max_bytes: u64,
    available: AtomicBool,
}

impl InMemoryLocalStore {
    pub fn new() -> Self {
        Self::with_quota(0)
    }

    /// `max_bytes == 0` disables the quota.
    pub fn with_quota(max_bytes: u64) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            max_bytes,
            available: AtomicBool::new(true),
        }
    }

    /// Simulate storage being disabled (private mode, revoked permission).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Value>>, StorageError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("storage disabled".into()));
        }
        self.entries
            .lock()
            .map_err(|_| StorageError::Unavailable("store lock poisoned".into()))
    }

    fn encoded_len(key: &str, value: &Value) -> u64 {
        (key.len() + value.to_string().len()) as u64
    }
}

impl Default for InMemoryLocalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStorePort for InMemoryLocalStore {
    fn read(&self, key: &str) -> Result<StoreRead, StorageError> {
        Ok(match self.entries()?.get(key) {
            Some(value) => StoreRead::Present(value.clone()),
            None => StoreRead::Absent,
        })
    }

    fn write(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        let mut entries = self.entries()?;
        if self.max_bytes > 0 {
            let others: u64 = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| Self::encoded_len(k, v))
                .sum();
            if others + Self::encoded_len(key, value) > self.max_bytes {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    limit_bytes: self.max_bytes,
                });
            }
        }
        entries.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries()?.remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .entries()?
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
