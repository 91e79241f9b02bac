//! # ws-core
//!
//! Core domain models and ports for wellsync.
//!
//! This crate contains pure business logic without any infrastructure dependencies:
//! the resumable [`Draft`] aggregate and its state machine, the [`SyncRecord`]
//! bookkeeping type, the local key convention, and the port traits that the
//! application layer drives.

pub mod config;
pub mod draft;
pub mod ids;
pub mod notification;
pub mod ports;
pub mod recovery;
pub mod storage_key;
pub mod sync;

// Re-export commonly used types at the crate root
pub use config::SyncConfig;
pub use draft::{
    Draft, DraftAction, DraftError, DraftEvent, DraftStateMachine, FlowSchema, HydrationReport,
    StepDefinition, StepSlice, StepValidation, StoredFlowState,
};
pub use ids::{EntityType, FlowName, LocalId, OwnerId, RemoteId};
pub use notification::NotificationKind;
pub use recovery::{RecoveryDecision, RecoveryOutcome, RecoverySource};
pub use storage_key::StorageKey;
pub use sync::{SyncRecord, SyncState};
