//! Text tokenizer for indexing and queries
//!
//! Pipeline: Unicode word segmentation → lowercase. Nothing else is dropped:
//! single characters, stopwords and ideographs are all terms. Indexing and
//! querying share it, so a stored text always matches a query for its own
//! words.

use rustc_hash::FxHashSet;
use unicode_segmentation::UnicodeSegmentation;

/// Split text into index terms.
///
/// ```
/// use nodwatch_engine::search::tokenize;
///
/// assert_eq!(tokenize("The MUAC of a patient"), vec!["the", "muac", "of", "a", "patient"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words().map(str::to_lowercase).collect()
}

/// Tokenize and deduplicate, keeping first occurrence order.
pub fn tokenize_unique(text: &str) -> Vec<String> {
    let mut seen = FxHashSet::default();
    tokenize(text)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}
