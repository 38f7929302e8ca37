//! Inverted index for one entity type
//!
//! Posting lists hold compact `u32` doc ids instead of entity ids; a single
//! bidirectional `DocIdMap` keeps one copy of each `EntityId`. Doc ids are
//! assigned on first indexing and survive re-indexing of the same entity,
//! so they double as the "first indexed" order used to break score ties.
//!
//! Ranking is BM25 with `k1 = 1.2`, `b = 0.75` over OR-combined query terms.

use super::tokenizer::{tokenize, tokenize_unique};
use dashmap::DashMap;
use nodwatch_core::EntityId;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// BM25 term-frequency saturation
pub const BM25_K1: f32 = 1.2;
/// BM25 length normalization
pub const BM25_B: f32 = 0.75;

// ============================================================================
// PostingEntry
// ============================================================================

/// Entry in a posting list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingEntry {
    /// Compact document identifier
    pub doc_id: u32,
    /// Term frequency in this document
    pub tf: u32,
    /// Document length in tokens
    pub doc_len: u32,
}

impl PostingEntry {
    /// Create a new posting entry
    pub fn new(doc_id: u32, tf: u32, doc_len: u32) -> Self {
        PostingEntry { doc_id, tf, doc_len }
    }
}

// ============================================================================
// DocIdMap
// ============================================================================

/// Bidirectional mapping between entity ids and doc ids
struct DocIdMap {
    /// doc_id -> EntityId (append-only)
    id_to_entity: RwLock<Vec<EntityId>>,
    /// EntityId -> doc_id
    entity_to_id: DashMap<EntityId, u32>,
}

impl DocIdMap {
    fn new() -> Self {
        Self {
            id_to_entity: RwLock::new(Vec::new()),
            entity_to_id: DashMap::new(),
        }
    }

    fn get_or_insert(&self, id: &EntityId) -> u32 {
        if let Some(doc_id) = self.entity_to_id.get(id) {
            return *doc_id;
        }

        let mut entities = self.id_to_entity.write();
        // Re-check under the write lock
        if let Some(doc_id) = self.entity_to_id.get(id) {
            return *doc_id;
        }
        let doc_id = entities.len() as u32;
        entities.push(id.clone());
        self.entity_to_id.insert(id.clone(), doc_id);
        doc_id
    }

    fn get(&self, id: &EntityId) -> Option<u32> {
        self.entity_to_id.get(id).map(|r| *r)
    }

    fn resolve(&self, doc_id: u32) -> Option<EntityId> {
        self.id_to_entity.read().get(doc_id as usize).cloned()
    }

    fn clear(&self) {
        self.id_to_entity.write().clear();
        self.entity_to_id.clear();
    }
}

// ============================================================================
// PostingList
// ============================================================================

/// Documents containing a term
#[derive(Debug, Clone, Default)]
pub struct PostingList {
    /// Document entries
    pub entries: Vec<PostingEntry>,
}

impl PostingList {
    /// Create an empty posting list
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry
    pub fn add(&mut self, entry: PostingEntry) {
        self.entries.push(entry);
    }

    /// Remove entries of a doc, returning how many were removed
    pub fn remove_by_id(&mut self, doc_id: u32) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.doc_id != doc_id);
        before - self.entries.len()
    }

    /// Number of documents containing this term
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if posting list is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A ranked match
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDoc {
    /// Matched entity
    pub id: EntityId,
    /// BM25 score
    pub score: f32,
}

// ============================================================================
// InvertedIndex
// ============================================================================

/// Inverted index over the documents of one entity type
///
/// Uses `DashMap` for posting lists, so readers and writers do not block
/// each other per term. The version watermark increases on every change.
pub struct InvertedIndex {
    /// Term -> posting list
    postings: DashMap<String, PostingList>,
    /// Term -> number of documents containing it
    doc_freqs: DashMap<String, usize>,
    /// Documents currently indexed
    total_docs: AtomicUsize,
    /// Sum of all document lengths
    total_doc_len: AtomicUsize,
    /// Version watermark
    version: AtomicU64,
    /// doc_id -> length, `None` once removed
    doc_lengths: RwLock<Vec<Option<u32>>>,
    doc_id_map: DocIdMap,
}

impl Default for InvertedIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl InvertedIndex {
    /// Create an empty index
    pub fn new() -> Self {
        InvertedIndex {
            postings: DashMap::new(),
            doc_freqs: DashMap::new(),
            total_docs: AtomicUsize::new(0),
            total_doc_len: AtomicUsize::new(0),
            version: AtomicU64::new(0),
            doc_lengths: RwLock::new(Vec::new()),
            doc_id_map: DocIdMap::new(),
        }
    }

    /// Drop every document and forget doc id assignments
    pub fn clear(&self) {
        self.postings.clear();
        self.doc_freqs.clear();
        self.doc_lengths.write().clear();
        self.doc_id_map.clear();
        self.total_docs.store(0, Ordering::Relaxed);
        self.total_doc_len.store(0, Ordering::Relaxed);
        self.version.fetch_add(1, Ordering::Release);
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Version watermark
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Number of indexed documents
    pub fn total_docs(&self) -> usize {
        self.total_docs.load(Ordering::Acquire)
    }

    /// Document frequency of a term
    pub fn doc_freq(&self, term: &str) -> usize {
        self.doc_freqs.get(term).map(|r| *r).unwrap_or(0)
    }

    /// Average document length in tokens
    pub fn avg_doc_len(&self) -> f32 {
        let total = self.total_docs.load(Ordering::Acquire);
        if total == 0 {
            return 0.0;
        }
        self.total_doc_len.load(Ordering::Acquire) as f32 / total as f32
    }

    /// Smoothed IDF: `ln((N - df + 0.5) / (df + 0.5) + 1)`
    pub fn compute_idf(&self, term: &str) -> f32 {
        let n = self.total_docs.load(Ordering::Acquire) as f32;
        let df = self.doc_freq(term) as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Check whether an entity is indexed
    pub fn contains(&self, id: &EntityId) -> bool {
        self.doc_id_map
            .get(id)
            .map(|doc_id| self.doc_len(doc_id).is_some())
            .unwrap_or(false)
    }

    fn doc_len(&self, doc_id: u32) -> Option<u32> {
        self.doc_lengths
            .read()
            .get(doc_id as usize)
            .copied()
            .flatten()
    }

    // ========================================================================
    // Index Updates
    // ========================================================================

    /// Index a document, replacing any previous version of it
    pub fn index_document(&self, id: &EntityId, text: &str) {
        let doc_id = self.doc_id_map.get_or_insert(id);
        if self.doc_len(doc_id).is_some() {
            self.remove_document(id);
        }

        let tokens = tokenize(text);
        let doc_len = tokens.len() as u32;

        let mut tf_map: FxHashMap<String, u32> = FxHashMap::default();
        for token in tokens {
            *tf_map.entry(token).or_insert(0) += 1;
        }

        for (term, tf) in tf_map {
            let entry = PostingEntry::new(doc_id, tf, doc_len);
            self.postings.entry(term.clone()).or_default().add(entry);
            self.doc_freqs
                .entry(term)
                .and_modify(|c| *c += 1)
                .or_insert(1);
        }

        {
            let mut lengths = self.doc_lengths.write();
            let idx = doc_id as usize;
            if idx >= lengths.len() {
                lengths.resize(idx + 1, None);
            }
            lengths[idx] = Some(doc_len);
        }

        self.total_docs.fetch_add(1, Ordering::Relaxed);
        self.total_doc_len
            .fetch_add(doc_len as usize, Ordering::Relaxed);
        self.version.fetch_add(1, Ordering::Release);
    }

    /// Remove a document
    ///
    /// Returns whether it was indexed.
    pub fn remove_document(&self, id: &EntityId) -> bool {
        let doc_id = match self.doc_id_map.get(id) {
            Some(doc_id) => doc_id,
            None => return false,
        };

        let doc_len = {
            let mut lengths = self.doc_lengths.write();
            lengths.get_mut(doc_id as usize).and_then(Option::take)
        };
        let len = match doc_len {
            Some(len) => len,
            None => return false,
        };

        let mut emptied = Vec::new();
        for mut entry in self.postings.iter_mut() {
            let count = entry.remove_by_id(doc_id);
            if count > 0 {
                let term = entry.key().clone();
                self.doc_freqs
                    .entry(term.clone())
                    .and_modify(|c| *c = c.saturating_sub(count));
                if entry.is_empty() {
                    emptied.push(term);
                }
            }
        }
        for term in emptied {
            self.postings.remove_if(&term, |_, list| list.is_empty());
            self.doc_freqs.remove_if(&term, |_, df| *df == 0);
        }

        self.total_docs.fetch_sub(1, Ordering::Relaxed);
        self.total_doc_len.fetch_sub(len as usize, Ordering::Relaxed);
        self.version.fetch_add(1, Ordering::Release);
        true
    }

    // ========================================================================
    // Query
    // ========================================================================

    /// Posting list of a term
    pub fn lookup(&self, term: &str) -> Option<PostingList> {
        self.postings.get(term).map(|r| r.clone())
    }

    /// All indexed terms
    pub fn terms(&self) -> Vec<String> {
        self.postings.iter().map(|r| r.key().clone()).collect()
    }

    /// Rank every document matching at least one query term
    ///
    /// Sorted by descending score, ties by first-indexed order.
    pub fn score(&self, query: &str) -> Vec<ScoredDoc> {
        let terms = tokenize_unique(query);
        if terms.is_empty() {
            return Vec::new();
        }

        let avg_len = self.avg_doc_len().max(1.0);
        let mut scores: FxHashMap<u32, f32> = FxHashMap::default();

        for term in &terms {
            let postings = match self.postings.get(term) {
                Some(p) => p.clone(),
                None => continue,
            };
            let idf = self.compute_idf(term);
            for entry in &postings.entries {
                let tf = entry.tf as f32;
                let norm = 1.0 - BM25_B + BM25_B * (entry.doc_len as f32 / avg_len);
                let term_score = idf * (tf * (BM25_K1 + 1.0)) / (tf + BM25_K1 * norm);
                *scores.entry(entry.doc_id).or_insert(0.0) += term_score;
            }
        }

        let mut ranked: Vec<(u32, f32)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        ranked
            .into_iter()
            .filter_map(|(doc_id, score)| {
                self.doc_id_map
                    .resolve(doc_id)
                    .map(|id| ScoredDoc { id, score })
            })
            .collect()
    }
}

impl std::fmt::Debug for InvertedIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvertedIndex")
            .field("total_docs", &self.total_docs())
            .field("terms", &self.postings.len())
            .field("version", &self.version())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
