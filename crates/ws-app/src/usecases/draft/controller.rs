//! Draft controller
//!
//! Drives a [`Draft`] through [`DraftStateMachine`] and executes the returned
//! actions: every accepted edit is written locally before the call returns,
//! the remote autosave is debounced, finished steps are pushed in the
//! background, and the final commit is the only remote call the user waits
//! for.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use ws_core::draft::CompletionMarker;
use ws_core::ports::GatewayError;
use ws_core::{
    Draft, DraftAction, DraftError, DraftEvent, DraftStateMachine, EntityType, FlowSchema,
    HydrationReport, LocalId, NotificationKind, OwnerId, RecoveryDecision, StepSlice,
    StepValidation, StorageKey,
};

use crate::deps::FlowServices;
use crate::usecases::internal::remote_call::bounded;

#[derive(Debug, thiserror::Error)]
pub enum DraftControllerError {
    #[error(transparent)]
    Draft(#[from] DraftError),

    /// The remote refused the final commit; the draft stays editable.
    #[error("final commit rejected: {0}")]
    CommitRejected(#[source] GatewayError),

    /// The remote could not be reached; the draft is kept locally for a retry.
    #[error("final commit deferred: {0}")]
    CommitDeferred(#[source] GatewayError),
}

/// Result of a successful [`DraftController::next`].
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Advanced { index: usize },
    Completed(Draft),
}

struct ControllerInner {
    schema: Arc<FlowSchema>,
    owner: OwnerId,
    services: FlowServices,
    draft: Mutex<Draft>,
    report: HydrationReport,
    autosave: Mutex<Option<JoinHandle<()>>>,
    dirty: AtomicBool,
    finalized: AtomicBool,
    committing: AtomicBool,
    commit_lock: tokio::sync::Mutex<()>,
}

/// One owner's live draft. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct DraftController {
    inner: Arc<ControllerInner>,
}

impl DraftController {
    /// Start a new draft at the first step and persist it locally.
    pub fn fresh(schema: Arc<FlowSchema>, owner: OwnerId, services: FlowServices) -> Self {
        let now = services.deps.clock.now_ms();
        let draft = schema.new_draft(&owner, now);
        Self::build(schema, draft, HydrationReport::default(), services)
    }

    /// Continue a draft that was already fitted onto `schema`.
    pub fn resume(
        schema: Arc<FlowSchema>,
        draft: Draft,
        report: HydrationReport,
        services: FlowServices,
    ) -> Self {
        if report.is_mismatch() {
            info!(
                flow = %schema.flow(),
                owner = %draft.owner_id,
                flagged = ?report.flagged_steps,
                orphaned = ?report.orphaned_steps,
                "resuming draft with schema adjustments"
            );
        }
        Self::build(schema, draft, report, services)
    }

    /// Build a controller for a recovery decision; `None` when the flow is
    /// already completed.
    pub fn from_recovery(
        schema: Arc<FlowSchema>,
        owner: OwnerId,
        decision: RecoveryDecision,
        services: FlowServices,
    ) -> Option<Self> {
        match decision {
            RecoveryDecision::Completed => None,
            RecoveryDecision::Resume { draft, report } => {
                Some(Self::resume(schema, draft, report, services))
            }
            RecoveryDecision::Fresh => Some(Self::fresh(schema, owner, services)),
        }
    }

    fn build(
        schema: Arc<FlowSchema>,
        draft: Draft,
        report: HydrationReport,
        services: FlowServices,
    ) -> Self {
        let controller = Self {
            inner: Arc::new(ControllerInner {
                schema,
                owner: draft.owner_id.clone(),
                services,
                finalized: AtomicBool::new(draft.completed),
                draft: Mutex::new(draft),
                report,
                autosave: Mutex::new(None),
                dirty: AtomicBool::new(false),
                committing: AtomicBool::new(false),
                commit_lock: tokio::sync::Mutex::new(()),
            }),
        };
        let snapshot = controller.snapshot();
        controller.inner.persist_draft(&snapshot);
        controller
    }

    pub fn owner(&self) -> &OwnerId {
        &self.inner.owner
    }

    pub fn schema(&self) -> &FlowSchema {
        &self.inner.schema
    }

    /// What hydration changed when this draft was resumed.
    pub fn hydration_report(&self) -> &HydrationReport {
        &self.inner.report
    }

    pub fn snapshot(&self) -> Draft {
        self.inner.lock_draft().clone()
    }

    pub fn current_step(&self) -> Option<StepSlice> {
        self.inner.lock_draft().current_step().cloned()
    }

    pub fn is_completed(&self) -> bool {
        self.inner.lock_draft().completed
    }

    /// Replace the active step's payload.
    ///
    /// The draft is written locally before this returns, whether or not the
    /// payload is complete; the returned validation lists what is missing.
    /// Fails with [`DraftError::CommitInFlight`] while the final commit runs.
    pub fn edit(&self, step_name: &str, payload: Value) -> Result<StepValidation, DraftError> {
        let schema = &self.inner.schema;
        let (actions, snapshot, validation) = {
            let mut draft = self.inner.lock_draft();
            self.inner.ensure_not_committing()?;
            let actions = DraftStateMachine::transition(
                schema,
                &mut draft,
                DraftEvent::Edit {
                    step_name: step_name.to_string(),
                    payload,
                },
                self.inner.now(),
            )?;
            let validation = match (schema.step(step_name), draft.current_step()) {
                (Some(definition), Some(slice)) => definition.validate(&slice.payload),
                _ => StepValidation::ok(),
            };
            (actions, draft.clone(), validation)
        };

        self.run_actions(actions, &snapshot);
        Ok(validation)
    }

    /// Advance past the active step, or commit when it is the last one.
    ///
    /// Validation happens before any remote call; an incomplete step fails
    /// fast with [`DraftError::StepIncomplete`].
    pub async fn next(&self) -> Result<StepOutcome, DraftControllerError> {
        let span = info_span!(
            "usecase.draft_controller.next",
            flow = %self.inner.schema.flow(),
            owner = %self.inner.owner
        );
        self.next_inner().instrument(span).await
    }

    async fn next_inner(&self) -> Result<StepOutcome, DraftControllerError> {
        let (actions, snapshot, commit) = {
            let mut draft = self.inner.lock_draft();
            self.inner.ensure_not_committing()?;
            let actions = DraftStateMachine::transition(
                &self.inner.schema,
                &mut draft,
                DraftEvent::Next,
                self.inner.now(),
            )?;
            let commit = actions.contains(&DraftAction::Commit);
            if commit {
                self.inner.committing.store(true, Ordering::SeqCst);
            }
            (actions, draft.clone(), commit)
        };
        let _in_flight = commit.then(|| CommitFlag(&self.inner.committing));

        self.run_actions(actions, &snapshot);
        if !commit {
            debug!(index = snapshot.current_step_index, "advanced");
            return Ok(StepOutcome::Advanced {
                index: snapshot.current_step_index,
            });
        }

        self.commit(snapshot).await
    }

    pub fn prev(&self) -> Result<usize, DraftError> {
        self.navigate(DraftEvent::Prev)
    }

    /// Jump to a step that was already reached.
    pub fn jump_to(&self, index: usize) -> Result<usize, DraftError> {
        self.navigate(DraftEvent::JumpTo { index })
    }

    fn navigate(&self, event: DraftEvent) -> Result<usize, DraftError> {
        let (actions, snapshot) = {
            let mut draft = self.inner.lock_draft();
            self.inner.ensure_not_committing()?;
            let actions = DraftStateMachine::transition(
                &self.inner.schema,
                &mut draft,
                event,
                self.inner.now(),
            )?;
            (actions, draft.clone())
        };
        self.run_actions(actions, &snapshot);
        Ok(snapshot.current_step_index)
    }

    /// Run a pending autosave now instead of waiting for the debounce.
    pub async fn flush(&self) {
        self.cancel_autosave();
        self.inner.autosave_now().await;
    }

    /// Drop every locally stored value of this flow and owner and start over.
    pub fn clear(&self) {
        self.cancel_autosave();
        self.inner.dirty.store(false, Ordering::SeqCst);

        let prefix = StorageKey::scope_prefix(self.inner.schema.flow(), &self.inner.owner);
        let removed = self.inner.services.persistence.remove_prefix(&prefix);
        self.inner.services.synchronizer.clear();

        let fresh = self.inner.schema.new_draft(&self.inner.owner, self.inner.now());
        *self.inner.lock_draft() = fresh;
        self.inner.finalized.store(false, Ordering::SeqCst);
        info!(prefix = %prefix, removed, "local flow data cleared");
    }

    fn run_actions(&self, actions: Vec<DraftAction>, snapshot: &Draft) {
        for action in actions {
            match action {
                DraftAction::PersistLocal => self.inner.persist_draft(snapshot),
                DraftAction::ScheduleAutosave => self.schedule_autosave(),
                DraftAction::UpsertStep { step_name, payload } => {
                    self.spawn_upsert_step(step_name, payload)
                }
                // Driven by `next` / `commit`.
                DraftAction::Commit | DraftAction::Finalize => {}
            }
        }
    }

    fn schedule_autosave(&self) {
        self.inner.dirty.store(true, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        let debounce = self.inner.services.settings.autosave_debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            inner.autosave_now().await;
        });
        if let Some(previous) = self.inner.autosave_slot().replace(handle) {
            previous.abort();
        }
    }

    fn cancel_autosave(&self) {
        if let Some(handle) = self.inner.autosave_slot().take() {
            handle.abort();
        }
    }

    fn spawn_upsert_step(&self, step_name: String, payload: Value) {
        let inner = Arc::clone(&self.inner);
        let span = info_span!("usecase.draft_controller.upsert_step", step = %step_name);
        tokio::spawn(
            async move {
                let gateway = &inner.services.deps.gateway;
                let result = bounded(
                    inner.services.settings.remote_timeout,
                    gateway.upsert_step(&inner.owner, &step_name, &payload),
                )
                .await;
                match result {
                    Ok(()) => debug!("step pushed to remote"),
                    Err(GatewayError::ValidationRejected { field, reason }) => {
                        warn!(field = %field, reason = %reason, "remote rejected step");
                        inner.services.deps.notifier.notify(
                            NotificationKind::Error,
                            &format!("{} was not accepted: {}", field, reason),
                        );
                    }
                    Err(err) => warn!(error = %err, "step push failed, kept locally"),
                }
            }
            .instrument(span),
        );
    }

    async fn commit(&self, snapshot: Draft) -> Result<StepOutcome, DraftControllerError> {
        let _guard = self.inner.commit_lock.lock().await;
        if self.inner.finalized.load(Ordering::SeqCst) {
            return Err(DraftError::AlreadyCompleted.into());
        }
        self.cancel_autosave();

        let services = &self.inner.services;
        let result = bounded(
            services.settings.remote_timeout,
            services.deps.gateway.commit(&self.inner.owner, &snapshot),
        )
        .await;

        match result {
            Ok(()) => {
                let completed = {
                    let mut draft = self.inner.lock_draft();
                    DraftStateMachine::transition(
                        &self.inner.schema,
                        &mut draft,
                        DraftEvent::CommitSucceeded,
                        self.inner.now(),
                    )?;
                    draft.clone()
                };
                self.inner.finalize(&completed).await;
                Ok(StepOutcome::Completed(completed))
            }
            Err(err) if err.is_transient() => {
                warn!(error = %err, "final commit could not reach the remote");
                services.deps.notifier.notify(
                    NotificationKind::Warning,
                    "Couldn't reach the server. Your answers are saved on this device; try finishing again once you're online.",
                );
                self.schedule_autosave();
                Err(DraftControllerError::CommitDeferred(err))
            }
            Err(err) => {
                error!(error = %err, "final commit rejected");
                services.deps.notifier.notify(
                    NotificationKind::Error,
                    &format!("Couldn't finish: {}", err),
                );
                Err(DraftControllerError::CommitRejected(err))
            }
        }
    }
}

/// Clears the in-flight flag however the commit ends.
struct CommitFlag<'a>(&'a AtomicBool);

impl Drop for CommitFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ControllerInner {
    fn ensure_not_committing(&self) -> Result<(), DraftError> {
        if self.committing.load(Ordering::SeqCst) {
            return Err(DraftError::CommitInFlight);
        }
        Ok(())
    }

    fn lock_draft(&self) -> MutexGuard<'_, Draft> {
        self.draft.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn autosave_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.autosave.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> i64 {
        self.services.deps.clock.now_ms()
    }

    fn draft_key(&self) -> String {
        StorageKey::draft(self.schema.flow(), &self.owner).to_string()
    }

    fn persist_draft(&self, draft: &Draft) {
        self.services.persistence.write_json(&self.draft_key(), draft);
    }

    /// Push the current draft through the synchronizer if anything changed
    /// since the last autosave.
    async fn autosave_now(&self) {
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return;
        }
        let snapshot = self.lock_draft().clone();
        if snapshot.completed {
            return;
        }
        let payload = match serde_json::to_value(&snapshot) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "draft not serializable, skipping autosave");
                return;
            }
        };

        let pending = self.services.synchronizer.save(
            EntityType::draft(),
            LocalId::from(self.schema.flow().as_str()),
            payload,
        );
        let outcome = pending.settled().await;
        debug!(?outcome, "autosave settled");
    }

    /// Runs at most once per draft lifecycle.
    async fn finalize(&self, draft: &Draft) {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return;
        }
        let now = self.now();
        let status_key = StorageKey::status(self.schema.flow(), &self.owner).to_string();
        self.services
            .persistence
            .write_json(&status_key, &CompletionMarker::at(now));

        match self.services.completion.on_complete(draft).await {
            Ok(()) => {
                self.dirty.store(false, Ordering::SeqCst);
                self.services.persistence.remove(&self.draft_key());
                self.services
                    .synchronizer
                    .delete(&EntityType::draft(), &LocalId::from(self.schema.flow().as_str()));
                info!(owner = %self.owner, "flow completed");
            }
            Err(err) => {
                error!(error = %err, "completion callback failed, keeping local draft");
                self.persist_draft(draft);
            }
        }

        self.services
            .deps
            .notifier
            .notify(NotificationKind::Success, "All done. Your answers are saved.");
    }
}
