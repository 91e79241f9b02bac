//! Session recovery
//!
//! Decides on mount whether a flow resumes, is already completed, or starts
//! fresh. Sources are consulted newest-authority first: the remote, the
//! local completion marker, the primary local draft, then legacy keys left by
//! older app versions. Whatever is found is fitted onto the current schema
//! and mirrored under the primary key so the next mount finds it there.
//!
//! ## Responsibilities
//!
//! - Pick the authoritative source for one owner's flow
//! - Ignore stored values that name another owner or flow
//! - Migrate legacy values onto the primary key

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, info_span, warn, Instrument};
use ws_core::draft::CompletionMarker;
use ws_core::ports::{ClockPort, RemoteGatewayPort};
use ws_core::storage_key::expand_legacy_key;
use ws_core::{
    Draft, FlowSchema, OwnerId, RecoveryDecision, RecoveryOutcome, RecoverySource, StorageKey,
    StoredFlowState,
};

use crate::deps::FlowDeps;
use crate::usecases::internal::local_persistence::LocalPersistence;
use crate::usecases::internal::remote_call::bounded;

pub struct SessionRecoveryResolver {
    schema: Arc<FlowSchema>,
    gateway: Arc<dyn RemoteGatewayPort>,
    clock: Arc<dyn ClockPort>,
    persistence: Arc<LocalPersistence>,
    remote_timeout: Duration,
}

impl SessionRecoveryResolver {
    pub fn new(
        schema: Arc<FlowSchema>,
        deps: &FlowDeps,
        persistence: Arc<LocalPersistence>,
        remote_timeout: Duration,
    ) -> Self {
        Self {
            schema,
            gateway: deps.gateway.clone(),
            clock: deps.clock.clone(),
            persistence,
            remote_timeout,
        }
    }

    pub async fn resolve(&self, owner: &OwnerId) -> RecoveryOutcome {
        let span = info_span!(
            "usecase.recovery.resolve",
            flow = %self.schema.flow(),
            owner = %owner
        );
        async {
            let outcome = match self.from_remote(owner).await {
                Some(outcome) => outcome,
                None => self
                    .from_local(owner)
                    .or_else(|| self.from_legacy(owner))
                    .unwrap_or_else(|| {
                        RecoveryOutcome::new(RecoveryDecision::Fresh, RecoverySource::Nowhere)
                    }),
            };
            info!(
                source = ?outcome.source,
                completed = outcome.is_completed(),
                resumed = outcome.resumed_draft().is_some(),
                "session recovery resolved"
            );
            outcome
        }
        .instrument(span)
        .await
    }

    async fn from_remote(&self, owner: &OwnerId) -> Option<RecoveryOutcome> {
        let status = match bounded(self.remote_timeout, self.gateway.fetch_status(owner)).await {
            Ok(status) => status,
            Err(err) => {
                warn!(error = %err, "remote status unavailable, falling back to local");
                return None;
            }
        };

        if status.completed {
            self.write_marker(owner);
            return Some(RecoveryOutcome::new(
                RecoveryDecision::Completed,
                RecoverySource::Remote,
            ));
        }

        let draft = status.draft?;
        if !self.belongs_here(&draft, owner) {
            warn!(stored_owner = %draft.owner_id, "remote draft belongs elsewhere, ignoring");
            return None;
        }
        Some(self.resume(owner, draft, RecoverySource::Remote))
    }

    fn from_local(&self, owner: &OwnerId) -> Option<RecoveryOutcome> {
        let flow = self.schema.flow();
        let status_key = StorageKey::status(flow, owner).to_string();
        if let Some(value) = self.persistence.read(&status_key) {
            if matches!(self.parse(&value, owner), Some(StoredFlowState::Completed)) {
                return Some(RecoveryOutcome::new(
                    RecoveryDecision::Completed,
                    RecoverySource::LocalStatus,
                ));
            }
            debug!(key = %status_key, "status key present but not a completion marker");
        }

        let draft_key = StorageKey::draft(flow, owner).to_string();
        let value = self.persistence.read(&draft_key)?;
        match self.parse(&value, owner) {
            Some(StoredFlowState::Completed) => Some(RecoveryOutcome::new(
                RecoveryDecision::Completed,
                RecoverySource::LocalPrimary,
            )),
            Some(StoredFlowState::InProgress(draft)) => {
                Some(self.resume(owner, draft, RecoverySource::LocalPrimary))
            }
            None => {
                warn!(key = %draft_key, "primary draft unreadable or foreign, ignoring");
                None
            }
        }
    }

    fn from_legacy(&self, owner: &OwnerId) -> Option<RecoveryOutcome> {
        for template in self.schema.legacy_keys() {
            let key = expand_legacy_key(template, owner);
            let Some(value) = self.persistence.read(&key) else {
                continue;
            };
            match self.parse(&value, owner) {
                Some(StoredFlowState::Completed) => {
                    info!(key = %key, "legacy completion found, migrating");
                    self.write_primary(owner, &value);
                    return Some(RecoveryOutcome::new(
                        RecoveryDecision::Completed,
                        RecoverySource::Legacy { key },
                    ));
                }
                Some(StoredFlowState::InProgress(draft)) => {
                    info!(key = %key, "legacy draft found, migrating");
                    return Some(self.resume(owner, draft, RecoverySource::Legacy { key }));
                }
                None => warn!(key = %key, "legacy value unreadable or foreign, skipping"),
            }
        }
        None
    }

    /// Fit `draft` onto the current schema and mirror it under the primary key.
    fn resume(&self, owner: &OwnerId, draft: Draft, source: RecoverySource) -> RecoveryOutcome {
        let (draft, report) = self.schema.hydrate(draft);
        if report.is_mismatch() {
            warn!(?report, "stored draft did not match the current schema");
        }
        if source != RecoverySource::LocalPrimary {
            if let Ok(value) = serde_json::to_value(&draft) {
                self.write_primary(owner, &value);
            }
        }
        RecoveryOutcome::new(RecoveryDecision::Resume { draft, report }, source)
    }

    fn parse(&self, value: &Value, owner: &OwnerId) -> Option<StoredFlowState> {
        StoredFlowState::from_value_for(value, self.schema.flow(), owner)
    }

    fn belongs_here(&self, draft: &Draft, owner: &OwnerId) -> bool {
        &draft.owner_id == owner && &draft.flow == self.schema.flow()
    }

    fn write_primary(&self, owner: &OwnerId, value: &Value) {
        let key = StorageKey::draft(self.schema.flow(), owner).to_string();
        self.persistence.write(&key, value);
    }

    fn write_marker(&self, owner: &OwnerId) {
        let key = StorageKey::status(self.schema.flow(), owner).to_string();
        self.persistence
            .write_json(&key, &CompletionMarker::at(self.clock.now_ms()));
    }
}
