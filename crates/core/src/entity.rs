use crate::descriptor::SearchDescriptor;
use crate::types::EntityId;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A typed record kind.
///
/// Entities are plain serde structs. Searchability is not inherited: a type
/// opts in by returning a [`SearchDescriptor`] naming the fields to index.
pub trait Entity: Serialize + DeserializeOwned {
    /// Entity type name used as the store shard and index namespace.
    const TYPE_NAME: &'static str;

    /// Searchable fields of this type, if any.
    fn descriptor() -> Option<SearchDescriptor> {
        None
    }
}

/// A typed entity together with its storage metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Stored<T> {
    /// Record identifier
    pub id: EntityId,
    /// Commit version that last wrote the record
    pub version: u64,
    /// First commit time
    pub created_at: DateTime<Utc>,
    /// Last commit time
    pub modified_at: DateTime<Utc>,
    /// The typed entity
    pub value: T,
}

impl<T> Stored<T> {
    /// Map the inner value, keeping metadata.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Stored<U> {
        Stored {
            id: self.id,
            version: self.version,
            created_at: self.created_at,
            modified_at: self.modified_at,
            value: f(self.value),
        }
    }
}

impl<T> std::ops::Deref for Stored<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}
