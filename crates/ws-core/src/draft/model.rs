use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{FlowName, OwnerId};

/// Data owned by one step of a flow.
///
/// `valid` is a cache of the step's validator output. It is recomputed on
/// every edit and on hydration, never trusted from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSlice {
    pub step_name: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub required: bool,
}

impl StepSlice {
    /// Whether `next()` may leave this step.
    pub fn can_advance(&self) -> bool {
        self.valid || !self.required
    }
}

/// In-progress aggregate for one multi-step flow instance.
///
/// Stored keys are camelCase so drafts written by earlier app versions parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub owner_id: OwnerId,
    pub flow: FlowName,
    pub steps: Vec<StepSlice>,
    pub current_step_index: usize,
    /// Highest step index ever reached; bounds `jump_to`.
    #[serde(default)]
    pub highest_reached_index: usize,
    /// Milliseconds since the Unix epoch.
    pub last_modified_at: i64,
    #[serde(default)]
    pub completed: bool,
    pub schema_version: String,
    /// Payloads of steps that no longer exist in the schema.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub orphaned: BTreeMap<String, Value>,
}

impl Draft {
    pub fn current_step(&self) -> Option<&StepSlice> {
        self.steps.get(self.current_step_index)
    }

    pub fn step(&self, step_name: &str) -> Option<&StepSlice> {
        self.steps.iter().find(|s| s.step_name == step_name)
    }

    pub fn step_index(&self, step_name: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.step_name == step_name)
    }

    pub fn is_last_step(&self) -> bool {
        self.current_step_index + 1 >= self.steps.len()
    }

    pub fn all_required_valid(&self) -> bool {
        self.steps.iter().all(StepSlice::can_advance)
    }

    /// Index of the first step that blocks forward progress, if any.
    pub fn first_blocking_step(&self) -> Option<usize> {
        self.steps.iter().position(|s| !s.can_advance())
    }
}
