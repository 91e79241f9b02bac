pub mod config;
pub mod tracing;
pub mod wiring;

pub use config::load_config;
pub use wiring::{build_flow_runtime, build_flow_runtime_with_store, FlowPorts, FlowRuntime, FlowStart};
