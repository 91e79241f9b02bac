//! Local durable store port
//!
//! Key/value persistence on the device, used as fallback cache and crash
//! recovery. Keys follow [`crate::storage_key::StorageKey`]; legacy keys are
//! arbitrary strings, so the port takes `&str`.

use serde_json::Value;

use super::errors::StorageError;

/// Result of a read. `Absent` is distinct from a stored `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreRead {
    Present(Value),
    Absent,
}

impl StoreRead {
    pub fn into_option(self) -> Option<Value> {
        match self {
            StoreRead::Present(value) => Some(value),
            StoreRead::Absent => None,
        }
    }
}

/// Synchronous like browser storage; writes are last-write-wins per key.
///
/// Two processes (or tabs) sharing one store race on the same key; nothing
/// here coordinates them.
pub trait LocalStorePort: Send + Sync {
    /// Read a key. Never fails for a key that was simply never written.
    fn read(&self, key: &str) -> Result<StoreRead, StorageError>;

    /// Write a JSON value.
    ///
    /// Error semantics:
    /// - Unavailable   : storage disabled or not reachable
    /// - QuotaExceeded : value does not fit
    fn write(&self, key: &str, value: &Value) -> Result<(), StorageError>;

    /// Remove a key. Removing an absent key succeeds.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// All keys starting with `prefix`, sorted.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

#[cfg(test)]
mockall::mock! {
    pub LocalStore {}

    impl LocalStorePort for LocalStore {
        fn read(&self, key: &str) -> Result<StoreRead, StorageError>;
        fn write(&self, key: &str, value: &Value) -> Result<(), StorageError>;
        fn remove(&self, key: &str) -> Result<(), StorageError>;
        fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
    }
}
