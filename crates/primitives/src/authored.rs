//! Shared listing for entities written by a user

use chrono::{DateTime, Utc};
use nodwatch_core::{Entity, Result, Stored};
use nodwatch_engine::Database;

/// An entity with an author and a creation time
pub(crate) trait Authored: Entity {
    fn user_id(&self) -> i64;
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Entities of one user, newest first; equal timestamps fall back to id
pub(crate) fn list_by_user<T: Authored>(db: &Database, user_id: i64) -> Result<Vec<Stored<T>>> {
    let mut items: Vec<Stored<T>> = db
        .entities::<T>()?
        .into_iter()
        .filter(|item| item.value.user_id() == user_id)
        .collect();
    items.sort_by(|a, b| {
        b.value
            .timestamp()
            .cmp(&a.value.timestamp())
            .then_with(|| b.id.cmp(&a.id))
    });
    Ok(items)
}
