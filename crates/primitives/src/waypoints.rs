//! Waypoints: places on a patient's route, drawn on the map
//!
//! Same facade shape as posts; only `place` is searchable.

use crate::authored::{list_by_user, Authored};
use chrono::{DateTime, Utc};
use nodwatch_core::{Entity, EntityId, Result, SearchDescriptor, Stored};
use nodwatch_engine::Database;
use nodwatch_search::{EntitySearch, SearchResults};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Picture shown for a waypoint without one
pub const DEFAULT_PICTURE: &str = "http://imgur.com/yI00Ehb.jpg";

/// Map circle color for a waypoint without one
pub const DEFAULT_COLOR: &str = "#8DBE1A";

fn default_picture() -> String {
    DEFAULT_PICTURE.to_string()
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

/// A place on the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Place name, the searchable part
    pub place: String,
    /// Origin longitude
    #[serde(default)]
    pub placelon: Option<String>,
    /// Origin latitude
    #[serde(default)]
    pub placelat: Option<String>,
    /// Destination longitude
    #[serde(default)]
    pub tolon: Option<String>,
    /// Destination latitude
    #[serde(default)]
    pub tolat: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_picture")]
    pub picture: String,
    #[serde(default = "default_color")]
    pub color: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: i64,
    #[serde(default)]
    pub language: Option<String>,
}

impl Waypoint {
    /// A waypoint created now with default picture and color
    pub fn new(user_id: i64, place: impl Into<String>) -> Self {
        Waypoint {
            place: place.into(),
            placelon: None,
            placelat: None,
            tolon: None,
            tolat: None,
            description: None,
            picture: default_picture(),
            color: default_color(),
            timestamp: Utc::now(),
            user_id,
            language: None,
        }
    }

    /// Set the origin and destination coordinates
    pub fn with_route(
        mut self,
        from: (impl Into<String>, impl Into<String>),
        to: (impl Into<String>, impl Into<String>),
    ) -> Self {
        self.placelon = Some(from.0.into());
        self.placelat = Some(from.1.into());
        self.tolon = Some(to.0.into());
        self.tolat = Some(to.1.into());
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Entity for Waypoint {
    const TYPE_NAME: &'static str = "waypoint";

    fn descriptor() -> Option<SearchDescriptor> {
        Some(SearchDescriptor::new(Self::TYPE_NAME, ["place"]))
    }
}

impl Authored for Waypoint {
    fn user_id(&self) -> i64 {
        self.user_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Waypoint facade
#[derive(Clone)]
pub struct WaypointStore {
    db: Arc<Database>,
}

impl WaypointStore {
    /// Create a new waypoint facade
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store a waypoint, returning its id
    pub fn create(&self, waypoint: &Waypoint) -> Result<EntityId> {
        self.db.transaction(|txn| txn.insert_entity(waypoint))
    }

    /// Load a waypoint
    pub fn get(&self, id: impl Into<EntityId>) -> Result<Option<Stored<Waypoint>>> {
        self.db.get_entity::<Waypoint>(id)
    }

    /// Replace a waypoint
    pub fn update(&self, id: impl Into<EntityId>, waypoint: &Waypoint) -> Result<()> {
        let id = id.into();
        self.db.transaction(|txn| txn.update_entity(id, waypoint))
    }

    /// Delete a waypoint
    pub fn delete(&self, id: impl Into<EntityId>) -> Result<bool> {
        let id = id.into();
        self.db.transaction(|txn| txn.delete_entity::<Waypoint>(id))
    }

    /// Waypoints by one user, newest first
    pub fn list_by_user(&self, user_id: i64) -> Result<Vec<Stored<Waypoint>>> {
        list_by_user(&self.db, user_id)
    }

    /// Ranked search over place names
    pub fn search(&self, query: &str, page: usize) -> Result<SearchResults<Waypoint>> {
        EntitySearch::new(Arc::clone(&self.db)).search::<Waypoint>(query, page)
    }
}
