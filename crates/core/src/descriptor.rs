//! Search descriptors
//!
//! A descriptor is the whole contract between an entity type and the search
//! index: the type name and the list of fields whose text gets indexed.

use crate::entity::Entity;
use crate::record::Record;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Searchable text extracted from one record, keyed by field name
pub type FieldValues = BTreeMap<String, String>;

/// Declares which fields of an entity type are searchable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDescriptor {
    /// Entity type name
    pub entity_type: String,
    /// Top-level field names in the record's JSON data
    pub fields: Vec<String>,
}

impl SearchDescriptor {
    /// Create a descriptor
    pub fn new<I, S>(entity_type: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entity_type: entity_type.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Extract the declared fields from a record
    ///
    /// Strings are taken verbatim, numbers and booleans are stringified.
    /// Missing, null, array and object values are skipped.
    pub fn extract(&self, record: &Record) -> FieldValues {
        let mut values = FieldValues::new();
        for field in &self.fields {
            let text = match record.data.get(field) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Number(n)) => n.to_string(),
                Some(serde_json::Value::Bool(b)) => b.to_string(),
                _ => continue,
            };
            values.insert(field.clone(), text);
        }
        values
    }
}

/// Registry of searchable entity types
///
/// Built once when the database is assembled and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct SearchRegistry {
    descriptors: FxHashMap<String, SearchDescriptor>,
}

impl SearchRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a descriptor
    pub fn register(&mut self, descriptor: SearchDescriptor) {
        self.descriptors
            .insert(descriptor.entity_type.clone(), descriptor);
    }

    /// Register the descriptor of a typed entity, if it has one
    pub fn register_entity<T: Entity>(&mut self) -> bool {
        match T::descriptor() {
            Some(d) => {
                self.register(d);
                true
            }
            None => false,
        }
    }

    /// Look up the descriptor for a type
    pub fn get(&self, entity_type: &str) -> Option<&SearchDescriptor> {
        self.descriptors.get(entity_type)
    }

    /// Is this type searchable?
    pub fn is_searchable(&self, entity_type: &str) -> bool {
        self.descriptors.contains_key(entity_type)
    }

    /// Registered type names, sorted
    pub fn entity_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.descriptors.keys().cloned().collect();
        types.sort();
        types
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Check if no type is registered
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
