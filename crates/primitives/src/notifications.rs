//! Per-user notifications
//!
//! A user holds at most one notification per name: adding one replaces the
//! previous entry of that name in the same transaction. Timestamps are
//! fractional Unix seconds so clients can poll with `since`.
//!
//! Adds for one user are serialized across a facade and its clones, so two
//! racing adds of the same name leave a single entry. Share one facade
//! (as `Nodwatch` does) rather than building several over the same database.

use chrono::Utc;
use dashmap::DashMap;
use nodwatch_core::{Entity, EntityId, Result, Stored};
use nodwatch_engine::Database;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// A named notification payload for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub name: String,
    pub user_id: i64,
    /// Unix time in seconds
    pub timestamp: f64,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Entity for Notification {
    const TYPE_NAME: &'static str = "notification";
}

/// Current time as fractional Unix seconds
pub fn unix_now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Notification facade
#[derive(Clone)]
pub struct Notifications {
    db: Arc<Database>,
    user_locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl Notifications {
    /// Create a new notification facade
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            user_locks: Arc::new(DashMap::new()),
        }
    }

    /// Replace the user's notification named `name`
    pub fn add(
        &self,
        user_id: i64,
        name: &str,
        payload: serde_json::Value,
    ) -> Result<EntityId> {
        self.add_with(user_id, name, || Ok(payload))
    }

    /// Replace the user's notification named `name`, computing the payload
    /// while other adds for this user wait
    pub fn add_with<F>(&self, user_id: i64, name: &str, payload: F) -> Result<EntityId>
    where
        F: FnOnce() -> Result<serde_json::Value>,
    {
        let lock = Arc::clone(self.user_locks.entry(user_id).or_default().value());
        let _guard = lock.lock();

        let payload = payload()?;
        let stale: Vec<EntityId> = self
            .for_user(user_id)?
            .into_iter()
            .filter(|n| n.name == name)
            .map(|n| n.id)
            .collect();

        let notification = Notification {
            name: name.to_string(),
            user_id,
            timestamp: unix_now(),
            payload,
        };

        let replaced = stale.len();
        let id = self.db.transaction(|txn| {
            for id in &stale {
                txn.delete_entity::<Notification>(id.clone())?;
            }
            txn.insert_entity(&notification)
        })?;

        debug!(target: "nodwatch::notifications", user_id, name, replaced, "notification added");
        Ok(id)
    }

    /// The user's notifications newer than `timestamp`, oldest first
    pub fn since(&self, user_id: i64, timestamp: f64) -> Result<Vec<Stored<Notification>>> {
        let mut items: Vec<_> = self
            .for_user(user_id)?
            .into_iter()
            .filter(|n| n.timestamp > timestamp)
            .collect();
        items.sort_by(|a, b| {
            a.timestamp
                .total_cmp(&b.timestamp)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(items)
    }

    fn for_user(&self, user_id: i64) -> Result<Vec<Stored<Notification>>> {
        Ok(self
            .db
            .entities::<Notification>()?
            .into_iter()
            .filter(|n| n.user_id == user_id)
            .collect())
    }
}
