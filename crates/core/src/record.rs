use crate::entity::{Entity, Stored};
use crate::error::Result;
use crate::types::{EntityId, EntityKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted record in the primary store.
///
/// `data` holds the JSON form of a typed entity. The store never interprets
/// it; search descriptors and typed facades read fields out of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub entity_type: String,
    pub id: EntityId,
    pub data: serde_json::Value,
    /// Commit version that last wrote this record (0 while staged)
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Record {
    /// Create an unversioned record stamped with the current time.
    pub fn new(entity_type: impl Into<String>, id: EntityId, data: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            entity_type: entity_type.into(),
            id,
            data,
            version: 0,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.entity_type.clone(), self.id.clone())
    }

    /// Extract a string value from `data` using a JSON pointer (e.g., "/body").
    pub fn get_str(&self, pointer: &str) -> Option<&str> {
        self.data.pointer(pointer).and_then(|v| v.as_str())
    }

    /// Extract a numeric value from `data` using a JSON pointer.
    pub fn get_number(&self, pointer: &str) -> Option<f64> {
        self.data.pointer(pointer).and_then(|v| v.as_f64())
    }

    /// Extract a boolean value from `data` using a JSON pointer.
    pub fn get_bool(&self, pointer: &str) -> Option<bool> {
        self.data.pointer(pointer).and_then(|v| v.as_bool())
    }

    /// Deserialize `data` into a typed entity.
    pub fn decode<T: Entity>(&self) -> Result<Stored<T>> {
        let value = serde_json::from_value(self.data.clone())?;
        Ok(Stored {
            id: self.id.clone(),
            version: self.version,
            created_at: self.created_at,
            modified_at: self.modified_at,
            value,
        })
    }
}
