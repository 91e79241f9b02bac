//! Remote data gateway port
//!
//! The hosted backend's per-entity CRUD surface as the draft and sync use
//! cases consume it. Implementations are expected to be idempotent under
//! retry keyed by `(owner, entity_type, local_id)` or `(owner, step_name)`;
//! callers rely on that but do not enforce it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::GatewayError;
use crate::draft::Draft;
use crate::ids::{EntityType, OwnerId, RemoteId};
use crate::sync::SyncRecord;

/// Remote view of one owner's flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStatus {
    pub completed: bool,
    #[serde(default)]
    pub draft: Option<Draft>,
}

/// One gateway instance serves one flow; authorization is per owner.
#[async_trait]
pub trait RemoteGatewayPort: Send + Sync {
    async fn fetch_status(&self, owner: &OwnerId) -> Result<RemoteStatus, GatewayError>;

    /// Error semantics: RemoteUnavailable | ValidationRejected
    async fn upsert_step(
        &self,
        owner: &OwnerId,
        step_name: &str,
        payload: &Value,
    ) -> Result<(), GatewayError>;

    /// Error semantics: RemoteUnavailable | ConflictRejected
    async fn commit(&self, owner: &OwnerId, draft: &Draft) -> Result<(), GatewayError>;

    /// Error semantics: RemoteUnavailable
    async fn upsert_record(
        &self,
        entity_type: &EntityType,
        record: &SyncRecord,
    ) -> Result<RemoteId, GatewayError>;

    /// Error semantics: RemoteUnavailable | NotFound
    async fn delete_record(
        &self,
        entity_type: &EntityType,
        remote_id: &RemoteId,
    ) -> Result<(), GatewayError>;
}
