//! Session recovery decision types.

use serde::Serialize;

use crate::draft::{Draft, HydrationReport};

/// Where a recovered flow state was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoverySource {
    Remote,
    LocalStatus,
    LocalPrimary,
    Legacy { key: String },
    Nowhere,
}

/// What the UI should do with a flow on mount.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryDecision {
    /// Continue an in-progress draft, already fitted onto the current schema.
    Resume {
        draft: Draft,
        report: HydrationReport,
    },
    /// The flow was finished earlier; skip to completion.
    Completed,
    /// Nothing found; start a new draft.
    Fresh,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryOutcome {
    pub decision: RecoveryDecision,
    pub source: RecoverySource,
}

impl RecoveryOutcome {
    pub fn new(decision: RecoveryDecision, source: RecoverySource) -> Self {
        Self { decision, source }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.decision, RecoveryDecision::Completed)
    }

    pub fn resumed_draft(&self) -> Option<&Draft> {
        match &self.decision {
            RecoveryDecision::Resume { draft, .. } => Some(draft),
            _ => None,
        }
    }
}
