//! Shared helpers

use nodwatch::{
    domain_builder, EntityId, FieldValues, IndexError, IndexHits, MemoryIndex, Nodwatch,
    SearchIndex,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-memory index with an off switch
pub struct SwitchableIndex {
    inner: MemoryIndex,
    down: AtomicBool,
}

impl SwitchableIndex {
    pub fn new() -> Arc<Self> {
        Arc::new(SwitchableIndex {
            inner: MemoryIndex::new(),
            down: AtomicBool::new(false),
        })
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn guard(&self) -> Result<(), IndexError> {
        if self.down.load(Ordering::SeqCst) {
            Err(IndexError::Unavailable("search cluster unreachable".into()))
        } else {
            Ok(())
        }
    }
}

impl SearchIndex for SwitchableIndex {
    fn upsert(&self, t: &str, id: &EntityId, fields: &FieldValues) -> Result<(), IndexError> {
        self.guard()?;
        self.inner.upsert(t, id, fields)
    }

    fn delete(&self, t: &str, id: &EntityId) -> Result<(), IndexError> {
        self.guard()?;
        self.inner.delete(t, id)
    }

    fn query(&self, t: &str, q: &str, page: usize, size: usize) -> Result<IndexHits, IndexError> {
        self.guard()?;
        self.inner.query(t, q, page, size)
    }

    fn clear_type(&self, t: &str) -> Result<(), IndexError> {
        self.guard()?;
        self.inner.clear_type(t)
    }
}

/// App over a switchable index
pub fn app_with_switch() -> (Nodwatch, Arc<SwitchableIndex>) {
    let index = SwitchableIndex::new();
    let db = domain_builder().index(index.clone()).build().unwrap();
    (Nodwatch::from_database(Arc::new(db)), index)
}
