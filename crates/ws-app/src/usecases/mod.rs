//! Use cases.

pub mod draft;
mod internal;
pub mod recovery;
pub mod sync;

pub use draft::{DraftController, DraftControllerError, StepOutcome};
pub use internal::local_persistence::LocalPersistence;
pub use recovery::SessionRecoveryResolver;
pub use sync::{DualWriteSynchronizer, PendingDelete, PendingSave, SaveOutcome};
