use serde::{Deserialize, Serialize};

use super::id_macro::impl_id;

/// Stable identifier of the acting user.
///
/// Every local key and every gateway call is scoped by this id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl_id!(OwnerId);
