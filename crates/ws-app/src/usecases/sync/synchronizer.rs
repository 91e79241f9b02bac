//! Dual-write synchronizer
//!
//! Every save updates the in-memory collection and the local mirror first,
//! then pushes to the remote in the background. The caller gets the
//! optimistic record immediately; the remote result lands later and is
//! discarded if a newer write for the same record happened meanwhile.
//!
//! ## Responsibilities
//!
//! - Keep one collection per entity type, mirrored under `records:{entity}`
//! - Push, retry and delete records on the remote with a bounded timeout
//! - Report remote failures through the notifier

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use ws_core::ports::{ClockPort, GatewayError, NotifierPort, RemoteGatewayPort};
use ws_core::{
    EntityType, FlowName, LocalId, NotificationKind, OwnerId, StorageKey, SyncRecord, SyncState,
};

use crate::deps::FlowDeps;
use crate::usecases::internal::local_persistence::LocalPersistence;
use crate::usecases::internal::remote_call::bounded;

const INTERRUPTED_REASON: &str = "interrupted before the remote confirmed";

/// How a background remote write ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The result was applied to the record.
    Applied(SyncState),
    /// A newer write (or a delete) replaced the record; the result was dropped.
    Superseded,
}

/// Optimistic result of [`DualWriteSynchronizer::save`].
#[derive(Debug)]
pub struct PendingSave {
    record: SyncRecord,
    handle: JoinHandle<SaveOutcome>,
}

impl PendingSave {
    /// The record as the UI should show it right away (`PendingRemote`).
    pub fn record(&self) -> &SyncRecord {
        &self.record
    }

    /// Wait for the remote round trip.
    pub async fn settled(self) -> SaveOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(error = %err, local_id = %self.record.local_id, "remote save task failed");
                SaveOutcome::Superseded
            }
        }
    }
}

/// Result of [`DualWriteSynchronizer::delete`].
#[derive(Debug)]
pub struct PendingDelete {
    removed: bool,
    handle: Option<JoinHandle<Result<(), GatewayError>>>,
}

impl PendingDelete {
    /// Whether a local record existed.
    pub fn removed(&self) -> bool {
        self.removed
    }

    /// Wait for the remote delete; records never confirmed remotely resolve
    /// to `Ok` immediately.
    pub async fn settled(self) -> Result<(), GatewayError> {
        match self.handle {
            None => Ok(()),
            Some(handle) => handle.await.unwrap_or_else(|err| {
                Err(GatewayError::RemoteUnavailable(format!(
                    "delete task failed: {}",
                    err
                )))
            }),
        }
    }
}

type Collections = HashMap<EntityType, BTreeMap<LocalId, SyncRecord>>;

struct SyncInner {
    flow: FlowName,
    owner: OwnerId,
    gateway: Arc<dyn RemoteGatewayPort>,
    notifier: Arc<dyn NotifierPort>,
    clock: Arc<dyn ClockPort>,
    persistence: Arc<LocalPersistence>,
    remote_timeout: Duration,
    collections: Mutex<Collections>,
    version: AtomicU64,
}

/// Owner-scoped dual-write synchronizer. Cheap to clone.
#[derive(Clone)]
pub struct DualWriteSynchronizer {
    inner: Arc<SyncInner>,
}

impl DualWriteSynchronizer {
    pub fn new(
        flow: FlowName,
        owner: OwnerId,
        deps: &FlowDeps,
        persistence: Arc<LocalPersistence>,
        remote_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                flow,
                owner,
                gateway: deps.gateway.clone(),
                notifier: deps.notifier.clone(),
                clock: deps.clock.clone(),
                persistence,
                remote_timeout,
                collections: Mutex::new(HashMap::new()),
                version: AtomicU64::new(0),
            }),
        }
    }

    pub fn owner(&self) -> &OwnerId {
        &self.inner.owner
    }

    /// Record a write locally and start the remote write.
    ///
    /// Must be called inside a tokio runtime.
    pub fn save(&self, entity_type: EntityType, local_id: LocalId, payload: Value) -> PendingSave {
        let inner = &self.inner;
        let version = inner.version.fetch_add(1, Ordering::SeqCst) + 1;
        let now = inner.clock.now_ms();
        let mut record =
            SyncRecord::pending(entity_type.clone(), local_id.clone(), payload, version, now);

        {
            let mut collections = inner.collections();
            let collection = collections.entry(entity_type.clone()).or_default();
            if let Some(previous) = collection.get(&local_id) {
                record.last_confirmed_remote_id = previous.known_remote_id().cloned();
            }
            collection.insert(local_id.clone(), record.clone());
            inner.mirror(&entity_type, collection);
        }
        debug!(entity = %entity_type, local_id = %local_id, version, "record saved locally");

        let span = info_span!(
            "usecase.sync.save",
            entity = %entity_type,
            local_id = %local_id,
            version
        );
        let task_inner = Arc::clone(inner);
        let task_record = record.clone();
        let handle = tokio::spawn(async move { task_inner.push(task_record).await }.instrument(span));

        PendingSave { record, handle }
    }

    /// Remove a record locally and, if it ever reached the remote, there too.
    pub fn delete(&self, entity_type: &EntityType, local_id: &LocalId) -> PendingDelete {
        let inner = &self.inner;
        let removed = {
            let mut collections = inner.collections();
            collections.get_mut(entity_type).and_then(|collection| {
                let removed = collection.remove(local_id);
                if removed.is_some() {
                    inner.mirror(entity_type, collection);
                }
                removed
            })
        };

        let Some(removed) = removed else {
            debug!(entity = %entity_type, local_id = %local_id, "delete of unknown record");
            return PendingDelete {
                removed: false,
                handle: None,
            };
        };

        let Some(remote_id) = removed.known_remote_id().cloned() else {
            debug!(local_id = %local_id, "record never reached the remote, local delete only");
            return PendingDelete {
                removed: true,
                handle: None,
            };
        };

        let span = info_span!(
            "usecase.sync.delete",
            entity = %entity_type,
            local_id = %local_id,
            remote_id = %remote_id
        );
        let task_inner = Arc::clone(inner);
        let entity_type = entity_type.clone();
        let handle = tokio::spawn(
            async move {
                let result = bounded(
                    task_inner.remote_timeout,
                    task_inner.gateway.delete_record(&entity_type, &remote_id),
                )
                .await;
                match result {
                    Ok(()) | Err(GatewayError::NotFound) => {
                        info!("remote record deleted");
                        Ok(())
                    }
                    Err(err) => {
                        warn!(error = %err, "remote delete failed");
                        task_inner.notifier.notify(
                            NotificationKind::Warning,
                            "Deleted on this device. The copy in your account could not be removed yet.",
                        );
                        Err(err)
                    }
                }
            }
            .instrument(span),
        );

        PendingDelete {
            removed: true,
            handle: Some(handle),
        }
    }

    /// Load the mirrored collection for `entity_type` from local storage.
    ///
    /// Records already in memory win. Records persisted while a remote write
    /// was in flight come back as failed, ready for [`Self::resync_failed`].
    pub fn load(&self, entity_type: &EntityType) -> usize {
        let inner = &self.inner;
        let key = inner.records_key(entity_type);
        let Some(value) = inner.persistence.read(&key) else {
            return 0;
        };
        let records: Vec<SyncRecord> = match serde_json::from_value(value) {
            Ok(records) => records,
            Err(err) => {
                warn!(key = %key, error = %err, "mirrored records unreadable, ignoring");
                return 0;
            }
        };

        let mut loaded = 0;
        let mut max_version = 0;
        {
            let mut collections = inner.collections();
            let collection = collections.entry(entity_type.clone()).or_default();
            for mut record in records {
                max_version = max_version.max(record.version);
                if collection.contains_key(&record.local_id) {
                    continue;
                }
                if record.sync_state.is_pending() {
                    record.sync_state = SyncState::FailedRemote {
                        reason: INTERRUPTED_REASON.to_string(),
                    };
                }
                collection.insert(record.local_id.clone(), record);
                loaded += 1;
            }
        }
        inner.version.fetch_max(max_version, Ordering::SeqCst);

        info!(entity = %entity_type, loaded, "mirrored records loaded");
        loaded
    }

    pub fn records(&self, entity_type: &EntityType) -> Vec<SyncRecord> {
        self.inner
            .collections()
            .get(entity_type)
            .map(|collection| collection.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get(&self, entity_type: &EntityType, local_id: &LocalId) -> Option<SyncRecord> {
        self.inner
            .collections()
            .get(entity_type)
            .and_then(|collection| collection.get(local_id).cloned())
    }

    /// Retry every failed record of `entity_type`.
    pub fn resync_failed(&self, entity_type: &EntityType) -> Vec<PendingSave> {
        let failed: Vec<(LocalId, Value)> = self
            .records(entity_type)
            .into_iter()
            .filter(|record| record.sync_state.is_failed())
            .map(|record| (record.local_id, record.payload))
            .collect();

        if !failed.is_empty() {
            info!(entity = %entity_type, count = failed.len(), "resyncing failed records");
        }
        failed
            .into_iter()
            .map(|(local_id, payload)| self.save(entity_type.clone(), local_id, payload))
            .collect()
    }

    /// Forget every in-memory record. Local mirrors are left to the caller.
    pub fn clear(&self) {
        self.inner.collections().clear();
    }
}

impl SyncInner {
    fn collections(&self) -> MutexGuard<'_, Collections> {
        self.collections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn records_key(&self, entity_type: &EntityType) -> String {
        StorageKey::records(&self.flow, &self.owner, entity_type).to_string()
    }

    /// Write the collection to its local key, or drop the key once empty.
    /// Callers hold the collections lock so mirrors land in change order.
    fn mirror(&self, entity_type: &EntityType, collection: &BTreeMap<LocalId, SyncRecord>) {
        let key = self.records_key(entity_type);
        if collection.is_empty() {
            self.persistence.remove(&key);
            return;
        }
        let records: Vec<&SyncRecord> = collection.values().collect();
        self.persistence.write_json(&key, &records);
    }

    async fn push(&self, record: SyncRecord) -> SaveOutcome {
        let result = bounded(
            self.remote_timeout,
            self.gateway.upsert_record(&record.entity_type, &record),
        )
        .await;
        self.apply(&record, result)
    }

    fn apply(&self, sent: &SyncRecord, result: Result<ws_core::RemoteId, GatewayError>) -> SaveOutcome {
        let now = self.clock.now_ms();
        let state = {
            let mut collections = self.collections();
            let Some(collection) = collections.get_mut(&sent.entity_type) else {
                debug!("record deleted while remote write was in flight");
                return SaveOutcome::Superseded;
            };
            let Some(current) = collection.get_mut(&sent.local_id) else {
                debug!("record deleted while remote write was in flight");
                return SaveOutcome::Superseded;
            };
            if current.version != sent.version {
                debug!(
                    current = current.version,
                    sent = sent.version,
                    "discarding stale remote response"
                );
                return SaveOutcome::Superseded;
            }

            current.last_attempt_at = now;
            current.sync_state = match &result {
                Ok(remote_id) => {
                    current.last_confirmed_remote_id = Some(remote_id.clone());
                    SyncState::Synced {
                        remote_id: remote_id.clone(),
                    }
                }
                Err(err) => SyncState::FailedRemote {
                    reason: err.to_string(),
                },
            };
            let state = current.sync_state.clone();
            self.mirror(&sent.entity_type, collection);
            state
        };

        match result {
            Ok(remote_id) => info!(remote_id = %remote_id, "remote write confirmed"),
            Err(err) => {
                warn!(error = %err, "remote write failed, record kept locally");
                self.notify_failure(&err);
            }
        }
        SaveOutcome::Applied(state)
    }

    fn notify_failure(&self, err: &GatewayError) {
        if err.is_transient() {
            self.notifier.notify(
                NotificationKind::Warning,
                "Saved on this device. It will sync when the connection is back.",
            );
        } else {
            self.notifier.notify(
                NotificationKind::Error,
                &format!("Saved only on this device: {}", err),
            );
        }
    }
}
