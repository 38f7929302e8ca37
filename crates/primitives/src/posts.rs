//! Posts: patient visit notes with nutritional measurements
//!
//! Stateless facade over the Database. Every write runs in its own
//! transaction, so the search index follows commits without any extra call.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use nodwatch_engine::DatabaseBuilder;
//! use nodwatch_primitives::{Post, PostStore};
//!
//! let db = Arc::new(DatabaseBuilder::new().register::<Post>().build().unwrap());
//! let posts = PostStore::new(db);
//!
//! posts.create(&Post::new(7, "Weight check, MUAC normal")).unwrap();
//! let page = posts.search("muac", 1).unwrap();
//! assert_eq!(page.total, 1);
//! ```

use crate::authored::{list_by_user, Authored};
use chrono::{DateTime, Utc};
use nodwatch_core::{Entity, EntityId, Result, SearchDescriptor, Stored};
use nodwatch_engine::Database;
use nodwatch_search::{EntitySearch, SearchResults};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A visit note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Free text, the searchable part
    pub body: String,
    /// Height in centimetres
    #[serde(default)]
    pub height: Option<f64>,
    /// Weight in kilograms
    #[serde(default)]
    pub weight: Option<f64>,
    /// Body mass index
    #[serde(default)]
    pub bmi: Option<f64>,
    /// Mid-upper arm circumference in centimetres
    #[serde(default)]
    pub muac: Option<f64>,
    /// When the note was written
    pub timestamp: DateTime<Utc>,
    /// Author
    pub user_id: i64,
    /// Language code of `body`
    #[serde(default)]
    pub language: Option<String>,
}

impl Post {
    /// A note written now, without measurements
    pub fn new(user_id: i64, body: impl Into<String>) -> Self {
        Post {
            body: body.into(),
            height: None,
            weight: None,
            bmi: None,
            muac: None,
            timestamp: Utc::now(),
            user_id,
            language: None,
        }
    }

    /// Attach height and weight, deriving BMI
    pub fn with_measurements(mut self, height_cm: f64, weight_kg: f64) -> Self {
        self.height = Some(height_cm);
        self.weight = Some(weight_kg);
        if height_cm > 0.0 {
            let metres = height_cm / 100.0;
            self.bmi = Some(weight_kg / (metres * metres));
        }
        self
    }

    /// Attach a MUAC reading
    pub fn with_muac(mut self, muac_cm: f64) -> Self {
        self.muac = Some(muac_cm);
        self
    }

    /// Set the language code
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

impl Entity for Post {
    const TYPE_NAME: &'static str = "post";

    fn descriptor() -> Option<SearchDescriptor> {
        Some(SearchDescriptor::new(Self::TYPE_NAME, ["body"]))
    }
}

impl Authored for Post {
    fn user_id(&self) -> i64 {
        self.user_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Post facade
#[derive(Clone)]
pub struct PostStore {
    db: Arc<Database>,
}

impl PostStore {
    /// Create a new post facade
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store a post, returning its id
    pub fn create(&self, post: &Post) -> Result<EntityId> {
        self.db.transaction(|txn| txn.insert_entity(post))
    }

    /// Load a post
    pub fn get(&self, id: impl Into<EntityId>) -> Result<Option<Stored<Post>>> {
        self.db.get_entity::<Post>(id)
    }

    /// Replace a post; `NotFound` if it does not exist
    pub fn update(&self, id: impl Into<EntityId>, post: &Post) -> Result<()> {
        let id = id.into();
        self.db.transaction(|txn| txn.update_entity(id, post))
    }

    /// Delete a post, returning whether it existed
    pub fn delete(&self, id: impl Into<EntityId>) -> Result<bool> {
        let id = id.into();
        self.db.transaction(|txn| txn.delete_entity::<Post>(id))
    }

    /// Posts by one user, newest first
    pub fn list_by_user(&self, user_id: i64) -> Result<Vec<Stored<Post>>> {
        list_by_user(&self.db, user_id)
    }

    /// Ranked full-text search over post bodies
    pub fn search(&self, query: &str, page: usize) -> Result<SearchResults<Post>> {
        EntitySearch::new(Arc::clone(&self.db)).search::<Post>(query, page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use nodwatch_core::Error;
    use nodwatch_engine::DatabaseBuilder;

    fn setup() -> (Arc<Database>, PostStore) {
        let db = Arc::new(DatabaseBuilder::new().register::<Post>().build().unwrap());
        let posts = PostStore::new(Arc::clone(&db));
        (db, posts)
    }

    #[test]
    fn test_create_and_get() {
        let (_db, posts) = setup();
        let post = Post::new(1, "first visit").with_measurements(120.0, 24.0);
        let id = posts.create(&post).unwrap();

        let stored = posts.get(id.clone()).unwrap().unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.body, "first visit");
        let bmi = stored.bmi.unwrap();
        assert!((bmi - 24.0 / 1.44).abs() < 1e-9);
    }

    #[test]
    fn test_update_is_searchable() {
        let (_db, posts) = setup();
        let id = posts.create(&Post::new(1, "swelling on left foot")).unwrap();

        let mut edited = posts.get(id.clone()).unwrap().unwrap().value;
        edited.body = "swelling resolved".into();
        posts.update(id.clone(), &edited).unwrap();

        assert_eq!(posts.search("resolved", 1).unwrap().total, 1);
        assert_eq!(posts.search("foot", 1).unwrap().total, 0);
    }

    #[test]
    fn test_update_missing_post() {
        let (_db, posts) = setup();
        let err = posts.update(99i64, &Post::new(1, "ghost")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_delete() {
        let (_db, posts) = setup();
        let id = posts.create(&Post::new(1, "to remove")).unwrap();

        assert!(posts.delete(id.clone()).unwrap());
        assert!(!posts.delete(id.clone()).unwrap());
        assert!(posts.get(id).unwrap().is_none());
        assert_eq!(posts.search("remove", 1).unwrap().total, 0);
    }

    #[test]
    fn test_list_by_user_newest_first() {
        let (_db, posts) = setup();
        let now = Utc::now();
        for (n, age) in [3i64, 1, 2].iter().enumerate() {
            let mut post = Post::new(5, format!("note {}", n));
            post.timestamp = now - Duration::hours(*age);
            posts.create(&post).unwrap();
        }
        posts.create(&Post::new(6, "someone else")).unwrap();

        let listed = posts.list_by_user(5).unwrap();
        let bodies: Vec<&str> = listed.iter().map(|p| p.body.as_str()).collect();
        assert_eq!(bodies, vec!["note 1", "note 2", "note 0"]);
    }

    #[test]
    fn test_search_results_are_typed() {
        let (_db, posts) = setup();
        posts
            .create(&Post::new(2, "oedema noted").with_language("en"))
            .unwrap();

        let results = posts.search("oedema", 1).unwrap();
        assert_eq!(results.items[0].language.as_deref(), Some("en"));
        assert!(!results.has_next());
    }
}
