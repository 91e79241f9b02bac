//! Draft state machine.
//!
//! Defines a pure transition function for multi-step drafts. Side effects are
//! returned as [`DraftAction`]s for the application layer to execute.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::Draft;
use super::schema::FlowSchema;

/// Events that drive a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DraftEvent {
    /// Replace the payload of the active step.
    Edit { step_name: String, payload: Value },
    /// Advance past the active step.
    Next,
    /// Go back one step.
    Prev,
    /// Jump to a previously reached step.
    JumpTo { index: usize },
    /// The remote accepted the final commit.
    CommitSucceeded,
}

/// Side-effects produced by transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DraftAction {
    /// Write the whole draft under its primary local key.
    PersistLocal,
    /// (Re)start the debounced remote autosave.
    ScheduleAutosave,
    /// Push one finished step to the remote.
    UpsertStep { step_name: String, payload: Value },
    /// Send the final draft to the remote.
    Commit,
    /// Fire the completion callback, drop the local draft, leave a marker.
    Finalize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    #[error("step {step} is incomplete: missing {missing:?}")]
    StepIncomplete { step: String, missing: Vec<String> },
    #[error("step {got} is not the active step ({expected})")]
    NotActiveStep { expected: String, got: String },
    #[error("unknown step {0}")]
    UnknownStep(String),
    #[error("already at the first step")]
    AtFirstStep,
    #[error("cannot jump to step {requested}; highest reached is {highest_reached}")]
    JumpNotAllowed {
        requested: usize,
        highest_reached: usize,
    },
    #[error("draft is already completed")]
    AlreadyCompleted,
    #[error("draft is not ready to complete")]
    NotReadyToComplete,
    #[error("active step index {index} is out of range for {len} steps")]
    CursorOutOfRange { index: usize, len: usize },
    #[error("a commit is in flight")]
    CommitInFlight,
}

/// Pure draft state machine.
///
/// Transitions either apply fully or leave the draft untouched and return an
/// error.
pub struct DraftStateMachine;

impl DraftStateMachine {
    pub fn transition(
        schema: &FlowSchema,
        draft: &mut Draft,
        event: DraftEvent,
        now_ms: i64,
    ) -> Result<Vec<DraftAction>, DraftError> {
        if draft.completed {
            return Err(DraftError::AlreadyCompleted);
        }

        match event {
            DraftEvent::Edit { step_name, payload } => {
                let definition = schema
                    .step(&step_name)
                    .ok_or_else(|| DraftError::UnknownStep(step_name.clone()))?;
                let index = draft.current_step_index;
                let len = draft.steps.len();
                let active = draft
                    .steps
                    .get_mut(index)
                    .ok_or(DraftError::CursorOutOfRange { index, len })?;
                if active.step_name != step_name {
                    return Err(DraftError::NotActiveStep {
                        expected: active.step_name.clone(),
                        got: step_name,
                    });
                }

                let payload = definition.normalize(payload);
                active.valid = definition.validate(&payload).is_valid();
                active.payload = payload;
                draft.last_modified_at = now_ms;

                Ok(vec![DraftAction::PersistLocal, DraftAction::ScheduleAutosave])
            }
            DraftEvent::Next => {
                let index = draft.current_step_index;
                let active = draft.steps.get(index).ok_or(DraftError::CursorOutOfRange {
                    index,
                    len: draft.steps.len(),
                })?;
                if !active.can_advance() {
                    let missing = schema
                        .step(&active.step_name)
                        .map(|def| def.validate(&active.payload).missing)
                        .unwrap_or_default();
                    return Err(DraftError::StepIncomplete {
                        step: active.step_name.clone(),
                        missing,
                    });
                }

                let upsert = DraftAction::UpsertStep {
                    step_name: active.step_name.clone(),
                    payload: active.payload.clone(),
                };

                if draft.is_last_step() {
                    if let Some(step) = draft
                        .first_blocking_step()
                        .and_then(|blocking| draft.steps.get(blocking))
                    {
                        return Err(DraftError::StepIncomplete {
                            step: step.step_name.clone(),
                            missing: schema
                                .step(&step.step_name)
                                .map(|def| def.validate(&step.payload).missing)
                                .unwrap_or_default(),
                        });
                    }
                    draft.last_modified_at = now_ms;
                    return Ok(vec![DraftAction::PersistLocal, upsert, DraftAction::Commit]);
                }

                draft.current_step_index = index + 1;
                draft.highest_reached_index = draft.highest_reached_index.max(index + 1);
                draft.last_modified_at = now_ms;
                Ok(vec![
                    DraftAction::PersistLocal,
                    upsert,
                    DraftAction::ScheduleAutosave,
                ])
            }
            DraftEvent::Prev => {
                if draft.current_step_index == 0 {
                    return Err(DraftError::AtFirstStep);
                }
                draft.current_step_index -= 1;
                draft.last_modified_at = now_ms;
                Ok(vec![DraftAction::PersistLocal, DraftAction::ScheduleAutosave])
            }
            DraftEvent::JumpTo { index } => {
                if index >= draft.steps.len() || index > draft.highest_reached_index {
                    return Err(DraftError::JumpNotAllowed {
                        requested: index,
                        highest_reached: draft.highest_reached_index,
                    });
                }
                draft.current_step_index = index;
                draft.last_modified_at = now_ms;
                Ok(vec![DraftAction::PersistLocal, DraftAction::ScheduleAutosave])
            }
            DraftEvent::CommitSucceeded => {
                if !draft.is_last_step() || !draft.all_required_valid() {
                    return Err(DraftError::NotReadyToComplete);
                }
                draft.completed = true;
                draft.last_modified_at = now_ms;
                Ok(vec![DraftAction::Finalize])
            }
        }
    }
}
