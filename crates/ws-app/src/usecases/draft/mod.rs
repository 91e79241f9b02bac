//! Resumable multi-step draft use case.

mod controller;

pub use controller::{DraftController, DraftControllerError, StepOutcome};
