//! Port interfaces for the application layer
//!
//! Ports define the contract between the draft/sync use cases and their
//! infrastructure implementations (browser-like key/value storage, the hosted
//! backend, the UI toast channel, the clock).

mod clock;
pub mod completion;
pub mod errors;
pub mod local_store;
pub mod notifier;
pub mod remote_gateway;

pub use clock::*;
pub use completion::CompletionPort;
pub use errors::{GatewayError, StorageError};
pub use local_store::{LocalStorePort, StoreRead};
pub use notifier::NotifierPort;
pub use remote_gateway::{RemoteGatewayPort, RemoteStatus};
