//! File-based local store
//!
//! One JSON file per key under a root directory. File names are the
//! hex-encoded key so arbitrary legacy key names map to valid paths and can be
//! listed back by prefix.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};
use ws_core::ports::{LocalStorePort, StorageError, StoreRead};

pub const DEFAULT_STORE_DIR: &str = "local_store";

const ENTRY_EXTENSION: &str = "json";

pub struct FileLocalStore {
    root: PathBuf,
    max_bytes: u64,
}

impl FileLocalStore {
    /// Create a store rooted at `root`; `max_bytes == 0` disables the quota.
    pub fn new(root: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    /// Create a store under the default subdirectory of `base_dir`.
    pub fn with_defaults(base_dir: impl AsRef<Path>) -> Self {
        Self::new(base_dir.as_ref().join(DEFAULT_STORE_DIR), 0)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", hex::encode(key.as_bytes()), ENTRY_EXTENSION))
    }

    fn key_from_path(path: &Path) -> Option<String> {
        if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let bytes = hex::decode(stem).ok()?;
        String::from_utf8(bytes).ok()
    }

    fn ensure_root(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).map_err(|e| {
            StorageError::Unavailable(format!(
                "create store dir failed: {}: {}",
                self.root.display(),
                e
            ))
        })
    }

    fn used_bytes_excluding(&self, excluded: &Path) -> Result<u64, StorageError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StorageError::Unavailable(e.to_string())),
        };
        let mut total = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path == excluded || Self::key_from_path(&path).is_none() {
                continue;
            }
            total += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
        Ok(total)
    }

    /// Write to a uniquely named temp file in the root, then rename over the target.
    fn atomic_write(&self, path: &Path, content: &[u8]) -> Result<(), StorageError> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".entry-")
            .suffix(".tmp")
            .tempfile_in(&self.root)
            .map_err(|e| {
                StorageError::Unavailable(format!(
                    "create temp entry failed: {}: {}",
                    self.root.display(),
                    e
                ))
            })?;
        tmp.write_all(content).map_err(|e| {
            StorageError::Unavailable(format!(
                "write temp entry failed: {}: {}",
                tmp.path().display(),
                e
            ))
        })?;
        tmp.persist(path).map_err(|e| {
            StorageError::Unavailable(format!(
                "rename temp entry failed: {} -> {}: {}",
                e.file.path().display(),
                path.display(),
                e.error
            ))
        })?;
        Ok(())
    }
}

impl LocalStorePort for FileLocalStore {
    fn read(&self, key: &str) -> Result<StoreRead, StorageError> {
        let path = self.entry_path(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StoreRead::Absent),
            Err(e) => return Err(StorageError::Unavailable(e.to_string())),
        };

        if content.trim().is_empty() {
            return Ok(StoreRead::Absent);
        }

        serde_json::from_str(&content)
            .map(StoreRead::Present)
            .map_err(|e| {
                warn!(key, error = %e, "stored entry is not valid JSON");
                StorageError::Corrupt {
                    key: key.to_string(),
                    reason: e.to_string(),
                }
            })
    }

    fn write(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        self.ensure_root()?;
        let path = self.entry_path(key);
        let content = serde_json::to_vec(value).map_err(|e| StorageError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        if self.max_bytes > 0 {
            let used = self.used_bytes_excluding(&path)?;
            if used + content.len() as u64 > self.max_bytes {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    limit_bytes: self.max_bytes,
                });
            }
        }

        self.atomic_write(&path, &content)?;
        debug!(key, bytes = content.len(), "local entry written");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Unavailable(e.to_string())),
        }
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Unavailable(e.to_string())),
        };
        let mut keys: Vec<String> = entries
            .flatten()
            .filter_map(|entry| Self::key_from_path(&entry.path()))
            .filter(|key| key.starts_with(prefix))
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_read_returns_absent_when_file_not_exists() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileLocalStore::new(temp_dir.path().join("store"), 0);

        assert_eq!(store.read("onboarding:u1:draft").unwrap(), StoreRead::Absent);
    }

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileLocalStore::new(temp_dir.path(), 0);
        let value = json!({"currentStepIndex": 2, "steps": []});

        store.write("onboarding:u1:draft", &value).unwrap();

        assert_eq!(
            store.read("onboarding:u1:draft").unwrap(),
            StoreRead::Present(value)
        );
        let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_concurrent_writes_to_same_key_all_succeed() {
        let temp_dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(FileLocalStore::new(temp_dir.path(), 0));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        store
                            .write("diary:u1:records:food_diary", &json!([{"t": t, "i": i}]))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(matches!(
            store.read("diary:u1:records:food_diary").unwrap(),
            StoreRead::Present(_)
        ));
        assert_eq!(store.keys_with_prefix("").unwrap().len(), 1);
    }

    #[test]
    fn test_empty_file_reads_as_absent() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileLocalStore::new(temp_dir.path(), 0);
        fs::write(store.entry_path("k"), "").unwrap();

        assert_eq!(store.read("k").unwrap(), StoreRead::Absent);
    }

    #[test]
    fn test_invalid_json_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileLocalStore::new(temp_dir.path(), 0);
        fs::write(store.entry_path("k"), "{invalid json").unwrap();

        assert!(matches!(
            store.read("k"),
            Err(StorageError::Corrupt { key, .. }) if key == "k"
        ));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileLocalStore::new(temp_dir.path(), 0);
        store.write("k", &json!(1)).unwrap();

        store.remove("k").unwrap();
        store.remove("k").unwrap();

        assert_eq!(store.read("k").unwrap(), StoreRead::Absent);
    }

    #[test]
    fn test_quota_exceeded() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileLocalStore::new(temp_dir.path(), 16);
        store.write("a", &json!("0123456789")).unwrap();

        let err = store.write("b", &json!("0123456789")).unwrap_err();

        assert_eq!(
            err,
            StorageError::QuotaExceeded {
                key: "b".into(),
                limit_bytes: 16
            }
        );
        store.write("a", &json!("abcdefghij")).unwrap();
    }

    #[test]
    fn test_keys_with_prefix_decodes_names() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileLocalStore::new(temp_dir.path(), 0);
        store.write("onboarding:u1:draft", &json!({})).unwrap();
        store.write("onboarding:u1:records:food_diary", &json!([])).unwrap();
        store.write("old_flow_v1", &json!({"completed": true})).unwrap();

        assert_eq!(
            store.keys_with_prefix("onboarding:u1:").unwrap(),
            vec![
                "onboarding:u1:draft".to_string(),
                "onboarding:u1:records:food_diary".to_string()
            ]
        );
    }

    #[test]
    fn test_keys_with_prefix_on_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileLocalStore::with_defaults(temp_dir.path());
        assert!(store.keys_with_prefix("").unwrap().is_empty());
    }
}
