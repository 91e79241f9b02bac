//! Local key namespace.
//!
//! Every key written by this crate's consumers has the shape
//! `{flow}:{owner}:{purpose}` so that two users sharing a device never read
//! each other's drafts.

use std::fmt::{Display, Formatter};

use crate::ids::{EntityType, FlowName, OwnerId};

/// Placeholder substituted with the owner id in legacy key templates.
pub const OWNER_PLACEHOLDER: &str = "{owner}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPurpose {
    /// The in-progress draft.
    Draft,
    /// Completion marker written after a successful commit.
    Status,
    /// Mirrored collection of sync records for one entity type.
    Records(EntityType),
}

impl Display for KeyPurpose {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyPurpose::Draft => write!(f, "draft"),
            KeyPurpose::Status => write!(f, "status"),
            KeyPurpose::Records(entity) => write!(f, "records:{}", entity),
        }
    }
}

/// Owner-scoped local storage key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKey {
    pub flow: FlowName,
    pub owner: OwnerId,
    pub purpose: KeyPurpose,
}

impl StorageKey {
    pub fn new(flow: &FlowName, owner: &OwnerId, purpose: KeyPurpose) -> Self {
        Self {
            flow: flow.clone(),
            owner: owner.clone(),
            purpose,
        }
    }

    pub fn draft(flow: &FlowName, owner: &OwnerId) -> Self {
        Self::new(flow, owner, KeyPurpose::Draft)
    }

    pub fn status(flow: &FlowName, owner: &OwnerId) -> Self {
        Self::new(flow, owner, KeyPurpose::Status)
    }

    pub fn records(flow: &FlowName, owner: &OwnerId, entity: &EntityType) -> Self {
        Self::new(flow, owner, KeyPurpose::Records(entity.clone()))
    }

    /// Prefix shared by every key of one flow and owner.
    pub fn scope_prefix(flow: &FlowName, owner: &OwnerId) -> String {
        format!("{}:{}:", flow, owner)
    }
}

impl Display for StorageKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.flow, self.owner, self.purpose)
    }
}

/// Expand a legacy key template for the given owner.
///
/// Templates without the `{owner}` placeholder are returned verbatim; those
/// are the unscoped keys older app versions wrote.
pub fn expand_legacy_key(template: &str, owner: &OwnerId) -> String {
    template.replace(OWNER_PLACEHOLDER, owner.as_str())
}
