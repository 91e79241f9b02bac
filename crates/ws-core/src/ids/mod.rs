//! ID type wrappers for type safety.

mod id_macro;
pub mod names;
pub mod owner_id;
pub mod record_id;

pub use names::{EntityType, FlowName};
pub use owner_id::OwnerId;
pub use record_id::{LocalId, RemoteId};
