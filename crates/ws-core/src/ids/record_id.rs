use serde::{Deserialize, Serialize};

use super::id_macro::impl_id;

/// Client-assigned record identifier, stable across retries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(String);

/// Identifier assigned by the remote store once a record is persisted there.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl_id!(LocalId, RemoteId);

impl LocalId {
    /// Generate a fresh random local id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for LocalId {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_local_ids_are_unique() {
        assert_ne!(LocalId::new(), LocalId::new());
    }

    #[test]
    fn test_remote_id_from_str() {
        let id: RemoteId = "row-7".into();
        assert_eq!(id.as_str(), "row-7");
    }
}
