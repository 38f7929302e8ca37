//! Full reindex of one entity type
//!
//! Clears the type's entries, then streams every record from the primary
//! store and upserts its declared fields. Used to bootstrap an empty index
//! and to recover from failed synchronization.

use super::memory::{IndexError, SearchIndex};
use nodwatch_core::{EntityId, Error, RecordSource, Result, SearchDescriptor};
use tracing::{info, warn};

/// Outcome of reindexing one type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReindexReport {
    /// Entity type that was rebuilt
    pub entity_type: String,
    /// Records written to the index
    pub indexed: usize,
    /// Records the index refused
    pub failures: Vec<(EntityId, IndexError)>,
}

impl ReindexReport {
    /// True if every record was indexed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Rebuild the index entries of `descriptor.entity_type` from `source`
///
/// Fails only if the existing entries cannot be cleared; per-record
/// failures are reported.
pub fn reindex(
    source: &dyn RecordSource,
    index: &dyn SearchIndex,
    descriptor: &SearchDescriptor,
) -> Result<ReindexReport> {
    let entity_type = descriptor.entity_type.as_str();
    index
        .clear_type(entity_type)
        .map_err(|e| Error::SearchUnavailable(format!("cannot clear {}: {}", entity_type, e)))?;

    let mut report = ReindexReport {
        entity_type: entity_type.to_string(),
        ..ReindexReport::default()
    };

    for record in source.scan(entity_type) {
        let fields = descriptor.extract(&record);
        match index.upsert(entity_type, &record.id, &fields) {
            Ok(()) => report.indexed += 1,
            Err(e) => report.failures.push((record.id, e)),
        }
    }

    if report.is_complete() {
        info!(target: "nodwatch::index", entity_type, indexed = report.indexed, "reindex complete");
    } else {
        warn!(
            target: "nodwatch::index",
            entity_type,
            indexed = report.indexed,
            failed = report.failures.len(),
            "reindex incomplete"
        );
    }
    Ok(report)
}
