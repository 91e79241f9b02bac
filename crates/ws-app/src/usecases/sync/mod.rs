mod synchronizer;

pub use synchronizer::{DualWriteSynchronizer, PendingDelete, PendingSave, SaveOutcome};
