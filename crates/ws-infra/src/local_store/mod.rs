//! Local durable store adapters.

mod file_store;
mod memory_store;

pub use file_store::{FileLocalStore, DEFAULT_STORE_DIR};
pub use memory_store::InMemoryLocalStore;
