pub mod gateway;
pub mod local_store;
pub mod notify;
pub mod time;

pub use gateway::{FaultMode, InMemoryRemoteGateway};
pub use local_store::{FileLocalStore, InMemoryLocalStore};
pub use notify::{ChannelNotifier, Notification, TracingNotifier};
pub use time::SystemClock;
