//! wellsync application layer
//!
//! Use cases for resumable multi-step drafts and dual-write record sync:
//! [`DualWriteSynchronizer`], [`DraftController`] and
//! [`SessionRecoveryResolver`].

pub mod deps;
pub mod usecases;

pub use deps::{FlowDeps, FlowServices, FlowSettings};
pub use usecases::{
    DraftController, DraftControllerError, DualWriteSynchronizer, LocalPersistence,
    PendingDelete, PendingSave, SaveOutcome, SessionRecoveryResolver, StepOutcome,
};
