use serde::{Deserialize, Serialize};

use super::id_macro::impl_id;

/// Name of a multi-step flow, e.g. `onboarding`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowName(String);

/// Kind of synced entity, e.g. `food_diary` or `symptom_day`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(String);

impl_id!(FlowName, EntityType);

impl EntityType {
    pub const DRAFT: &'static str = "draft";

    /// Entity type under which a whole [`crate::Draft`] is autosaved.
    pub fn draft() -> Self {
        Self(Self::DRAFT.to_string())
    }
}
