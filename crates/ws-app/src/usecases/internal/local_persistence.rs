//! Degrade-aware access to the local durable store.
//!
//! The first failed write switches the session to in-memory only and raises
//! one warning; later writes are skipped. Reads keep going to the store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use ws_core::ports::{LocalStorePort, NotifierPort, StorageError, StoreRead};
use ws_core::NotificationKind;

const DEGRADED_MESSAGE: &str =
    "Device storage is unavailable. Changes are kept for this session only.";

pub struct LocalPersistence {
    store: Arc<dyn LocalStorePort>,
    notifier: Arc<dyn NotifierPort>,
    degraded: AtomicBool,
}

impl LocalPersistence {
    pub fn new(store: Arc<dyn LocalStorePort>, notifier: Arc<dyn NotifierPort>) -> Self {
        Self {
            store,
            notifier,
            degraded: AtomicBool::new(false),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Returns whether the value reached the store.
    pub fn write(&self, key: &str, value: &Value) -> bool {
        if self.is_degraded() {
            debug!(key, "local store degraded, keeping write in memory");
            return false;
        }
        match self.store.write(key, value) {
            Ok(()) => true,
            Err(err) => {
                self.degrade(key, &err);
                false
            }
        }
    }

    pub fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        match serde_json::to_value(value) {
            Ok(value) => self.write(key, &value),
            Err(err) => {
                warn!(key, error = %err, "value not serializable, skipping local write");
                false
            }
        }
    }

    /// Read a key; failures are logged and treated as absent.
    pub fn read(&self, key: &str) -> Option<Value> {
        match self.store.read(key) {
            Ok(StoreRead::Present(value)) => Some(value),
            Ok(StoreRead::Absent) => None,
            Err(err) => {
                warn!(key, error = %err, "local read failed, treating as absent");
                None
            }
        }
    }

    pub fn remove(&self, key: &str) {
        if let Err(err) = self.store.remove(key) {
            warn!(key, error = %err, "local remove failed");
        }
    }

    /// Remove every key under `prefix`; returns how many were removed.
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        match self.store.keys_with_prefix(prefix) {
            Ok(keys) => {
                for key in &keys {
                    self.remove(key);
                }
                keys.len()
            }
            Err(err) => {
                warn!(prefix, error = %err, "listing local keys failed");
                0
            }
        }
    }

    fn degrade(&self, key: &str, err: &StorageError) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            warn!(key, error = %err, "local store write failed, degrading to in-memory");
            self.notifier.notify(NotificationKind::Warning, DEGRADED_MESSAGE);
        }
    }
}
