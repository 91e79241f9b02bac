//! Draft domain module.
//!
//! A [`Draft`] is the in-progress aggregate of one multi-step flow. Its shape
//! is described by a [`FlowSchema`]; edits and navigation go through the pure
//! [`DraftStateMachine`].

pub mod model;
pub mod schema;
pub mod state_machine;
pub mod stored;
pub mod validation;

pub use model::{Draft, StepSlice};
pub use schema::{FlowSchema, HydrationReport, SchemaError, StepDefinition};
pub use state_machine::{DraftAction, DraftError, DraftEvent, DraftStateMachine};
pub use stored::{CompletionMarker, StoredFlowState};
pub use validation::{AcceptAll, RequiredFields, StepValidation, StepValidator};
