//! Remote gateway adapters.

mod memory_gateway;

pub use memory_gateway::{FaultMode, InMemoryRemoteGateway};
