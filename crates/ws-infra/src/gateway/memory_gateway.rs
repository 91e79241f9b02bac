//! In-memory remote gateway
//!
//! A stand-in for the hosted backend with fault injection. It honours the
//! idempotency contract (re-upserting the same local id yields the same
//! remote id) so use cases can be exercised offline and in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use ws_core::draft::Draft;
use ws_core::ids::{EntityType, LocalId, OwnerId, RemoteId};
use ws_core::ports::{GatewayError, RemoteGatewayPort, RemoteStatus};
use ws_core::sync::SyncRecord;

/// How the next calls should behave.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FaultMode {
    #[default]
    Healthy,
    /// Fail fast with `RemoteUnavailable`.
    Unavailable,
    /// Never answer; callers must time out.
    Hang,
    /// Reject step and record writes with `ValidationRejected`.
    RejectValidation { field: String, reason: String },
    /// Reject commits with `ConflictRejected`.
    RejectCommit(String),
}

#[derive(Default)]
struct RemoteState {
    completed: HashMap<OwnerId, bool>,
    drafts: HashMap<OwnerId, Draft>,
    steps: HashMap<(OwnerId, String), Value>,
    records: HashMap<(EntityType, LocalId), (RemoteId, Value)>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub fetch_status: u64,
    pub upsert_step: u64,
    pub commit: u64,
    pub upsert_record: u64,
    pub delete_record: u64,
}

pub struct InMemoryRemoteGateway {
    state: Mutex<RemoteState>,
    fault: Mutex<FaultMode>,
    latency: Mutex<Duration>,
    next_remote_id: AtomicU64,
    counts: Mutex<CallCounts>,
}

impl InMemoryRemoteGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RemoteState::default()),
            fault: Mutex::new(FaultMode::Healthy),
            latency: Mutex::new(Duration::ZERO),
            next_remote_id: AtomicU64::new(1),
            counts: Mutex::new(CallCounts::default()),
        }
    }

    pub fn set_fault(&self, fault: FaultMode) {
        if let Ok(mut guard) = self.fault.lock() {
            *guard = fault;
        }
    }

    /// Delay applied before every answer.
    pub fn set_latency(&self, latency: Duration) {
        if let Ok(mut guard) = self.latency.lock() {
            *guard = latency;
        }
    }

    pub fn mark_completed(&self, owner: &OwnerId) {
        if let Ok(mut state) = self.state.lock() {
            state.completed.insert(owner.clone(), true);
            state.drafts.remove(owner);
        }
    }

    pub fn seed_draft(&self, draft: Draft) {
        if let Ok(mut state) = self.state.lock() {
            state.drafts.insert(draft.owner_id.clone(), draft);
        }
    }

    pub fn is_completed(&self, owner: &OwnerId) -> bool {
        self.state
            .lock()
            .map(|s| s.completed.get(owner).copied().unwrap_or(false))
            .unwrap_or(false)
    }

    pub fn step_payload(&self, owner: &OwnerId, step_name: &str) -> Option<Value> {
        self.state
            .lock()
            .ok()?
            .steps
            .get(&(owner.clone(), step_name.to_string()))
            .cloned()
    }

    pub fn record(&self, entity_type: &EntityType, local_id: &LocalId) -> Option<(RemoteId, Value)> {
        self.state
            .lock()
            .ok()?
            .records
            .get(&(entity_type.clone(), local_id.clone()))
            .cloned()
    }

    pub fn record_count(&self, entity_type: &EntityType) -> usize {
        self.state
            .lock()
            .map(|s| s.records.keys().filter(|(e, _)| e == entity_type).count())
            .unwrap_or(0)
    }

    pub fn call_counts(&self) -> CallCounts {
        self.counts.lock().map(|c| *c).unwrap_or_default()
    }

    fn count(&self, bump: impl FnOnce(&mut CallCounts)) {
        if let Ok(mut counts) = self.counts.lock() {
            bump(&mut counts);
        }
    }

    fn fault(&self) -> FaultMode {
        self.fault.lock().map(|f| f.clone()).unwrap_or_default()
    }

    fn state(&self) -> Result<std::sync::MutexGuard<'_, RemoteState>, GatewayError> {
        self.state
            .lock()
            .map_err(|_| GatewayError::RemoteUnavailable("remote state poisoned".into()))
    }

    /// Apply latency and the transport-level faults shared by every call.
    async fn round_trip(&self) -> Result<FaultMode, GatewayError> {
        let latency = self.latency.lock().map(|l| *l).unwrap_or_default();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        match self.fault() {
            FaultMode::Unavailable => Err(GatewayError::RemoteUnavailable(
                "simulated network failure".into(),
            )),
            FaultMode::Hang => std::future::pending().await,
            other => Ok(other),
        }
    }
}

impl Default for InMemoryRemoteGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteGatewayPort for InMemoryRemoteGateway {
    async fn fetch_status(&self, owner: &OwnerId) -> Result<RemoteStatus, GatewayError> {
        self.count(|c| c.fetch_status += 1);
        self.round_trip().await?;
        let state = self.state()?;
        Ok(RemoteStatus {
            completed: state.completed.get(owner).copied().unwrap_or(false),
            draft: state.drafts.get(owner).cloned(),
        })
    }

    async fn upsert_step(
        &self,
        owner: &OwnerId,
        step_name: &str,
        payload: &Value,
    ) -> Result<(), GatewayError> {
        self.count(|c| c.upsert_step += 1);
        if let FaultMode::RejectValidation { field, reason } = self.round_trip().await? {
            return Err(GatewayError::ValidationRejected { field, reason });
        }
        self.state()?
            .steps
            .insert((owner.clone(), step_name.to_string()), payload.clone());
        Ok(())
    }

    async fn commit(&self, owner: &OwnerId, draft: &Draft) -> Result<(), GatewayError> {
        self.count(|c| c.commit += 1);
        if let FaultMode::RejectCommit(reason) = self.round_trip().await? {
            return Err(GatewayError::ConflictRejected(reason));
        }
        let mut state = self.state()?;
        state.completed.insert(owner.clone(), true);
        state.drafts.remove(owner);
        debug!(owner = %owner, steps = draft.steps.len(), "remote commit accepted");
        Ok(())
    }

    async fn upsert_record(
        &self,
        entity_type: &EntityType,
        record: &SyncRecord,
    ) -> Result<RemoteId, GatewayError> {
        self.count(|c| c.upsert_record += 1);
        if let FaultMode::RejectValidation { field, reason } = self.round_trip().await? {
            return Err(GatewayError::ValidationRejected { field, reason });
        }
        let mut state = self.state()?;
        let key = (entity_type.clone(), record.local_id.clone());
        let remote_id = match state.records.get(&key) {
            Some((remote_id, _)) => remote_id.clone(),
            None => RemoteId::from(format!(
                "remote-{}",
                self.next_remote_id.fetch_add(1, Ordering::SeqCst)
            )),
        };
        state
            .records
            .insert(key, (remote_id.clone(), record.payload.clone()));
        Ok(remote_id)
    }

    async fn delete_record(
        &self,
        entity_type: &EntityType,
        remote_id: &RemoteId,
    ) -> Result<(), GatewayError> {
        self.count(|c| c.delete_record += 1);
        self.round_trip().await?;
        let mut state = self.state()?;
        let key = state
            .records
            .iter()
            .find(|((entity, _), (id, _))| entity == entity_type && id == remote_id)
            .map(|(key, _)| key.clone())
            .ok_or(GatewayError::NotFound)?;
        state.records.remove(&key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(local_id: &str, payload: Value) -> SyncRecord {
        SyncRecord::pending("food_diary".into(), local_id.into(), payload, 1, 0)
    }

    #[tokio::test]
    async fn upsert_record_is_idempotent_by_local_id() {
        let gateway = InMemoryRemoteGateway::new();
        let entity = EntityType::from("food_diary");

        let first = gateway
            .upsert_record(&entity, &record("x", json!({"a": 1})))
            .await
            .unwrap();
        let second = gateway
            .upsert_record(&entity, &record("x", json!({"a": 2})))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(gateway.record_count(&entity), 1);
        assert_eq!(
            gateway.record(&entity, &"x".into()).map(|(_, v)| v),
            Some(json!({"a": 2}))
        );
    }

    #[tokio::test]
    async fn unavailable_fault_fails_every_call() {
        let gateway = InMemoryRemoteGateway::new();
        gateway.set_fault(FaultMode::Unavailable);

        let err = gateway.fetch_status(&"u1".into()).await.unwrap_err();

        assert!(err.is_transient());
        assert_eq!(gateway.call_counts().fetch_status, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hang_fault_never_answers() {
        let gateway = InMemoryRemoteGateway::new();
        gateway.set_fault(FaultMode::Hang);

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            gateway.upsert_record(&"food_diary".into(), &record("x", json!({}))),
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn delete_unknown_record_is_not_found() {
        let gateway = InMemoryRemoteGateway::new();
        let err = gateway
            .delete_record(&"food_diary".into(), &"remote-9".into())
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::NotFound);
    }

    #[tokio::test]
    async fn commit_marks_completed_and_drops_draft() {
        let gateway = InMemoryRemoteGateway::new();
        let owner = OwnerId::from("u1");
        gateway.set_fault(FaultMode::RejectCommit("version conflict".into()));
        let draft = Draft {
            owner_id: owner.clone(),
            flow: "onboarding".into(),
            steps: vec![],
            current_step_index: 0,
            highest_reached_index: 0,
            last_modified_at: 0,
            completed: false,
            schema_version: "1".into(),
            orphaned: Default::default(),
        };
        gateway.seed_draft(draft.clone());

        assert_eq!(
            gateway.commit(&owner, &draft).await.unwrap_err(),
            GatewayError::ConflictRejected("version conflict".into())
        );

        gateway.set_fault(FaultMode::Healthy);
        gateway.commit(&owner, &draft).await.unwrap();
        let status = gateway.fetch_status(&owner).await.unwrap();
        assert!(status.completed);
        assert!(status.draft.is_none());
    }
}
