//! Sync record bookkeeping.

pub mod record;

pub use record::{SyncRecord, SyncState};
