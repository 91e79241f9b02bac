use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{EntityType, LocalId, RemoteId};

/// Durability of one locally visible record.
///
/// Only `Synced` carries a remote id, so a pending or failed record can never
/// claim one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "syncState", rename_all = "camelCase")]
pub enum SyncState {
    Synced {
        #[serde(rename = "remoteId")]
        remote_id: RemoteId,
    },
    PendingRemote,
    FailedRemote {
        #[serde(default)]
        reason: String,
    },
}

impl SyncState {
    pub fn label(&self) -> &'static str {
        match self {
            SyncState::Synced { .. } => "synced",
            SyncState::PendingRemote => "pendingRemote",
            SyncState::FailedRemote { .. } => "failedRemote",
        }
    }

    pub fn is_synced(&self) -> bool {
        matches!(self, SyncState::Synced { .. })
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, SyncState::PendingRemote)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SyncState::FailedRemote { .. })
    }
}

/// One committed entity (a diary entry, a tracker day, a draft) and its
/// remote durability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    pub local_id: LocalId,
    pub entity_type: EntityType,
    pub payload: Value,
    #[serde(flatten)]
    pub sync_state: SyncState,
    /// Milliseconds since the Unix epoch of the last remote attempt.
    pub last_attempt_at: i64,
    /// Monotonic write version; remote responses for older versions are discarded.
    #[serde(default)]
    pub version: u64,
    /// Remote id confirmed by an earlier save, kept to route deletes while a
    /// newer write is unconfirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_confirmed_remote_id: Option<RemoteId>,
}

impl SyncRecord {
    pub fn pending(
        entity_type: EntityType,
        local_id: LocalId,
        payload: Value,
        version: u64,
        now_ms: i64,
    ) -> Self {
        Self {
            local_id,
            entity_type,
            payload,
            sync_state: SyncState::PendingRemote,
            last_attempt_at: now_ms,
            version,
            last_confirmed_remote_id: None,
        }
    }

    pub fn remote_id(&self) -> Option<&RemoteId> {
        match &self.sync_state {
            SyncState::Synced { remote_id } => Some(remote_id),
            _ => None,
        }
    }

    /// Best known remote id, for deletes.
    pub fn known_remote_id(&self) -> Option<&RemoteId> {
        self.remote_id().or(self.last_confirmed_remote_id.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sync_state_serializes_flat_with_camel_case_tag() {
        let mut record = SyncRecord::pending("food_diary".into(), "x".into(), json!({"a": 1}), 3, 10);
        record.sync_state = SyncState::Synced {
            remote_id: "r-1".into(),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["syncState"], "synced");
        assert_eq!(value["remoteId"], "r-1");
        assert_eq!(value["localId"], "x");

        let back: SyncRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_remote_id_only_when_synced() {
        let mut record = SyncRecord::pending("food_diary".into(), "x".into(), json!({}), 1, 0);
        record.last_confirmed_remote_id = Some("r-old".into());

        assert_eq!(record.remote_id(), None);
        assert_eq!(record.known_remote_id().map(|r| r.as_str()), Some("r-old"));
        assert_eq!(record.sync_state.label(), "pendingRemote");
    }
}
