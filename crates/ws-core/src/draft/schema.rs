//! Flow schema: the ordered step definitions a draft is validated against.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use super::model::{Draft, StepSlice};
use super::validation::{StepValidation, StepValidator};
use crate::ids::{FlowName, OwnerId};

/// One step of a flow: its name, whether it gates progress, and its predicate.
#[derive(Clone)]
pub struct StepDefinition {
    pub name: String,
    pub required: bool,
    validator: Arc<dyn StepValidator>,
}

impl StepDefinition {
    pub fn required(name: impl Into<String>, validator: impl StepValidator + 'static) -> Self {
        Self {
            name: name.into(),
            required: true,
            validator: Arc::new(validator),
        }
    }

    pub fn optional(name: impl Into<String>, validator: impl StepValidator + 'static) -> Self {
        Self {
            name: name.into(),
            required: false,
            validator: Arc::new(validator),
        }
    }

    pub fn validate(&self, payload: &Value) -> StepValidation {
        self.validator.validate(payload)
    }

    pub fn normalize(&self, payload: Value) -> Value {
        self.validator.normalize(payload)
    }

    fn slice_from(&self, payload: Value) -> StepSlice {
        let payload = self.normalize(payload);
        let valid = self.validate(&payload).is_valid();
        StepSlice {
            step_name: self.name.clone(),
            payload,
            valid,
            required: self.required,
        }
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("name", &self.name)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("flow {0} defines no steps")]
    NoSteps(FlowName),
    #[error("flow {flow} defines step {step} more than once")]
    DuplicateStep { flow: FlowName, step: String },
}

/// What changed while fitting a stored draft onto the current schema.
///
/// A non-empty report means the caller should prompt re-entry of
/// `flagged_steps`; nothing stored was dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HydrationReport {
    /// `(stored, current)` when the stored schema version differs.
    pub version_mismatch: Option<(String, String)>,
    /// Stored step index before clamping, when it had to move.
    pub clamped_from: Option<usize>,
    /// Steps whose stored validity no longer holds, or that are new and incomplete.
    pub flagged_steps: Vec<String>,
    /// Stored steps unknown to the schema, kept in `Draft::orphaned`.
    pub orphaned_steps: Vec<String>,
    /// The stored draft claimed completion but a required step is invalid.
    pub completion_revoked: bool,
}

impl HydrationReport {
    pub fn is_mismatch(&self) -> bool {
        self.version_mismatch.is_some()
            || self.clamped_from.is_some()
            || !self.flagged_steps.is_empty()
            || !self.orphaned_steps.is_empty()
            || self.completion_revoked
    }
}

/// Ordered step definitions of one flow plus its legacy key aliases.
#[derive(Debug, Clone)]
pub struct FlowSchema {
    flow: FlowName,
    version: String,
    steps: Vec<StepDefinition>,
    legacy_keys: Vec<String>,
}

impl FlowSchema {
    pub fn new(
        flow: impl Into<FlowName>,
        version: impl Into<String>,
        steps: Vec<StepDefinition>,
    ) -> Result<Self, SchemaError> {
        let flow = flow.into();
        if steps.is_empty() {
            return Err(SchemaError::NoSteps(flow));
        }
        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.name.as_str()) {
                return Err(SchemaError::DuplicateStep {
                    flow,
                    step: step.name.clone(),
                });
            }
        }
        Ok(Self {
            flow,
            version: version.into(),
            steps,
            legacy_keys: Vec::new(),
        })
    }

    /// Legacy key names (or `{owner}` templates) scanned during recovery, in order.
    pub fn with_legacy_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.legacy_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn flow(&self) -> &FlowName {
        &self.flow
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn legacy_keys(&self) -> &[String] {
        &self.legacy_keys
    }

    pub fn step(&self, name: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Build an empty draft positioned on the first step.
    pub fn new_draft(&self, owner: &OwnerId, now_ms: i64) -> Draft {
        Draft {
            owner_id: owner.clone(),
            flow: self.flow.clone(),
            steps: self.steps.iter().map(|def| def.slice_from(json!({}))).collect(),
            current_step_index: 0,
            highest_reached_index: 0,
            last_modified_at: now_ms,
            completed: false,
            schema_version: self.version.clone(),
            orphaned: BTreeMap::new(),
        }
    }

    /// Fit a stored draft onto this schema.
    ///
    /// Slices are matched by step name and re-validated. Unknown steps move to
    /// `orphaned`. The cursor follows its step by name; when that step is gone
    /// or the index is out of range it is clamped, and it never rests beyond
    /// the first required step that is now invalid.
    pub fn hydrate(&self, stored: Draft) -> (Draft, HydrationReport) {
        let mut report = HydrationReport::default();
        if stored.schema_version != self.version {
            report.version_mismatch = Some((stored.schema_version.clone(), self.version.clone()));
        }

        let stored_cursor = stored.current_step_index;
        let cursor_name = stored
            .steps
            .get(stored_cursor)
            .map(|s| s.step_name.clone());
        let stored_highest_name = stored
            .steps
            .get(stored.highest_reached_index)
            .map(|s| s.step_name.clone());

        let mut by_name: BTreeMap<String, StepSlice> = BTreeMap::new();
        for slice in stored.steps {
            by_name.entry(slice.step_name.clone()).or_insert(slice);
        }

        let steps: Vec<StepSlice> = self
            .steps
            .iter()
            .map(|def| match by_name.remove(&def.name) {
                Some(old) => {
                    let slice = def.slice_from(old.payload);
                    if old.valid && !slice.valid {
                        report.flagged_steps.push(def.name.clone());
                    }
                    slice
                }
                None => {
                    let slice = def.slice_from(json!({}));
                    if !slice.can_advance() {
                        report.flagged_steps.push(def.name.clone());
                    }
                    slice
                }
            })
            .collect();

        let mut orphaned = stored.orphaned;
        for (name, slice) in by_name {
            report.orphaned_steps.push(name.clone());
            orphaned.insert(name, slice.payload);
        }

        let last = steps.len() - 1;
        let position_of = |name: &Option<String>| {
            name.as_ref()
                .and_then(|n| steps.iter().position(|s| &s.step_name == n))
        };
        let mut cursor = position_of(&cursor_name).unwrap_or(stored_cursor.min(last));
        if let Some(gate) = steps.iter().position(|s| !s.can_advance()) {
            cursor = cursor.min(gate);
        }
        if cursor != stored_cursor || cursor_name.is_none() {
            report.clamped_from = Some(stored_cursor);
        }

        let gate_limit = steps.iter().position(|s| !s.can_advance()).unwrap_or(last);
        let highest = position_of(&stored_highest_name)
            .unwrap_or(stored.highest_reached_index.min(last))
            .max(cursor)
            .min(gate_limit.max(cursor));

        let all_valid = steps.iter().all(StepSlice::can_advance);
        if stored.completed && !all_valid {
            report.completion_revoked = true;
        }

        let draft = Draft {
            owner_id: stored.owner_id,
            flow: self.flow.clone(),
            steps,
            current_step_index: cursor,
            highest_reached_index: highest,
            last_modified_at: stored.last_modified_at,
            completed: stored.completed && all_valid,
            schema_version: self.version.clone(),
            orphaned,
        };

        #[cfg(feature = "tracing")]
        {
            if report.is_mismatch() {
                tracing::debug!(flow = %self.flow, report = ?report, "draft hydrated with schema mismatch");
            }
        }

        (draft, report)
    }
}
