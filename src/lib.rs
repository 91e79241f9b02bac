//! # wellsync
//!
//! Resumable multi-step drafts and dual-write record sync for client-side
//! wellness flows (onboarding, food diary, trackers).
//!
//! The domain lives in `ws-core`, the use cases in `ws-app` and the adapters
//! in `ws-infra`; this crate wires them together for a host application.

pub mod bootstrap;

pub use bootstrap::{build_flow_runtime, load_config, FlowPorts, FlowRuntime, FlowStart};
pub use ws_app::{
    DraftController, DraftControllerError, DualWriteSynchronizer, PendingSave, SaveOutcome,
    SessionRecoveryResolver, StepOutcome,
};
pub use ws_core::{
    Draft, FlowSchema, HydrationReport, NotificationKind, OwnerId, RecoveryDecision,
    RecoveryOutcome, StepDefinition, SyncConfig, SyncRecord, SyncState,
};
