//! Identifier types
//!
//! Records are addressed by an entity type name plus an [`EntityId`].
//! Integer ids come from the store's per-type sequence; string ids are
//! chosen by the caller (task ids are job ids, for example).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a record within its entity type
///
/// Ordering puts every integer id before every string id, then orders
/// naturally within each kind. This is the primary store's default ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    /// Store-assigned sequence number
    Int(i64),
    /// Caller-assigned identifier
    Str(String),
}

impl EntityId {
    /// Integer value, if this is an integer id
    pub fn as_int(&self) -> Option<i64> {
        match self {
            EntityId::Int(n) => Some(*n),
            EntityId::Str(_) => None,
        }
    }

    /// String value, if this is a string id
    pub fn as_str(&self) -> Option<&str> {
        match self {
            EntityId::Int(_) => None,
            EntityId::Str(s) => Some(s),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Int(n) => write!(f, "{}", n),
            EntityId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntityId {
    fn from(n: i64) -> Self {
        EntityId::Int(n)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId::Str(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        EntityId::Str(s)
    }
}

/// Fully qualified record address: entity type + id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    /// Entity type name (e.g. "post")
    pub entity_type: String,
    /// Identifier within the type
    pub id: EntityId,
}

impl EntityKey {
    /// Create a new key
    pub fn new(entity_type: impl Into<String>, id: impl Into<EntityId>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.id)
    }
}
