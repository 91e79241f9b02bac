//! Interpretation of raw values found in local storage.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::Draft;
use crate::ids::{FlowName, OwnerId};

/// Small marker left behind once a flow has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionMarker {
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<i64>,
}

impl CompletionMarker {
    pub fn at(now_ms: i64) -> Self {
        Self {
            completed: true,
            completed_at: Some(now_ms),
        }
    }
}

/// What a stored value says about a flow.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredFlowState {
    Completed,
    InProgress(Draft),
}

impl StoredFlowState {
    /// Parse a stored value; `None` when it is neither a completion marker
    /// nor a structurally valid draft.
    ///
    /// Anything carrying `"completed": true` counts as completed, whether it
    /// is a full draft or a bare marker from an older app version.
    pub fn from_value(value: &Value) -> Option<Self> {
        if value.get("completed").and_then(Value::as_bool) == Some(true) {
            return Some(Self::Completed);
        }
        serde_json::from_value::<Draft>(value.clone())
            .ok()
            .map(Self::InProgress)
    }

    /// Like [`from_value`](Self::from_value), but only accepts values that
    /// belong to `flow` and `owner`.
    ///
    /// A value naming another owner or flow is rejected even when it is
    /// marked completed. A bare marker carries no identity and is accepted.
    pub fn from_value_for(value: &Value, flow: &FlowName, owner: &OwnerId) -> Option<Self> {
        if !identity_matches(value, "ownerId", owner.as_str())
            || !identity_matches(value, "flow", flow.as_str())
        {
            return None;
        }
        match Self::from_value(value)? {
            Self::InProgress(draft) if &draft.owner_id != owner || &draft.flow != flow => None,
            state => Some(state),
        }
    }
}

fn identity_matches(value: &Value, field: &str, expected: &str) -> bool {
    match value.get(field) {
        None | Some(Value::Null) => true,
        Some(found) => found.as_str() == Some(expected),
    }
}
