//! Storage-facing traits
//!
//! `RecordSource` is the read side of the primary store as seen by search
//! resolution and reindexing. It exists so those paths can be exercised
//! against instrumented sources in tests.

use crate::error::Result;
use crate::record::Record;
use crate::types::EntityId;

/// Read access to the primary store
pub trait RecordSource: Send + Sync {
    /// Fetch the records of one type whose ids are in `ids`
    ///
    /// Missing ids are skipped. The returned order is the store's native
    /// order (ascending id), not the order of `ids`.
    fn fetch_many(&self, entity_type: &str, ids: &[EntityId]) -> Result<Vec<Record>>;

    /// Stream every record of one type in ascending id order
    fn scan<'a>(&'a self, entity_type: &str) -> Box<dyn Iterator<Item = Record> + 'a>;
}
