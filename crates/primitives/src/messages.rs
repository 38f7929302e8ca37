//! Private messages between caregivers
//!
//! Sending a message refreshes the recipient's `unread_message_count`
//! notification. Reading the inbox is separate from marking it read:
//! [`Messages::mark_read`] moves the user's read mark to now and resets the
//! count to zero.

use crate::notifications::Notifications;
use chrono::{DateTime, Utc};
use nodwatch_core::{Entity, EntityId, Result, Stored};
use nodwatch_engine::Database;
use nodwatch_search::SearchResults;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Name of the notification carrying the unread count
pub const UNREAD_MESSAGE_COUNT: &str = "unread_message_count";

/// A message from one user to another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sender_id: i64,
    pub recipient_id: i64,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// A message sent now
    pub fn new(sender_id: i64, recipient_id: i64, body: impl Into<String>) -> Self {
        Message {
            sender_id,
            recipient_id,
            body: body.into(),
            timestamp: Utc::now(),
        }
    }
}

impl Entity for Message {
    const TYPE_NAME: &'static str = "message";
}

/// When a user last read their messages; stored under the user's id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadMark {
    pub user_id: i64,
    pub last_read: DateTime<Utc>,
}

impl Entity for ReadMark {
    const TYPE_NAME: &'static str = "message_read";
}

/// Message facade
#[derive(Clone)]
pub struct Messages {
    db: Arc<Database>,
    notifications: Notifications,
}

impl Messages {
    /// Create a message facade that reports counts through `notifications`
    pub fn new(db: Arc<Database>, notifications: Notifications) -> Self {
        Self { db, notifications }
    }

    /// Store `message` and refresh the recipient's unread count
    pub fn send(&self, message: &Message) -> Result<EntityId> {
        let id = self.db.transaction(|txn| txn.insert_entity(message))?;

        let recipient = message.recipient_id;
        self.notifications
            .add_with(recipient, UNREAD_MESSAGE_COUNT, || {
                Ok(json!(self.unread_count(recipient)?))
            })?;

        debug!(target: "nodwatch::messages", sender = message.sender_id, recipient, "message sent");
        Ok(id)
    }

    /// Send a message written now
    pub fn send_text(&self, sender_id: i64, recipient_id: i64, body: &str) -> Result<EntityId> {
        self.send(&Message::new(sender_id, recipient_id, body))
    }

    /// One page of messages received by the user, newest first
    ///
    /// Page size comes from `search.per_page`.
    pub fn inbox(&self, user_id: i64, page: usize) -> Result<SearchResults<Message>> {
        let page = page.max(1);
        let page_size = self.db.per_page();
        let received = self.received(user_id)?;
        let total = received.len();
        let items = received
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();
        Ok(SearchResults {
            items,
            total,
            page,
            page_size,
        })
    }

    /// Messages received after `since`
    pub fn received_since(&self, user_id: i64, since: DateTime<Utc>) -> Result<usize> {
        Ok(self
            .received(user_id)?
            .iter()
            .filter(|m| m.timestamp > since)
            .count())
    }

    /// Messages received after the user's read mark; all of them if the
    /// user never read their messages
    pub fn unread_count(&self, user_id: i64) -> Result<usize> {
        match self.last_read(user_id)? {
            Some(since) => self.received_since(user_id, since),
            None => Ok(self.received(user_id)?.len()),
        }
    }

    /// The user's read mark, if they ever read their messages
    pub fn last_read(&self, user_id: i64) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .db
            .get_entity::<ReadMark>(user_id)?
            .map(|mark| mark.value.last_read))
    }

    /// Move the read mark to now and reset the unread count
    pub fn mark_read(&self, user_id: i64) -> Result<DateTime<Utc>> {
        let mark = ReadMark {
            user_id,
            last_read: Utc::now(),
        };
        self.db.transaction(|txn| {
            if txn.get_entity::<ReadMark>(user_id)?.is_some() {
                txn.update_entity(user_id, &mark)
            } else {
                txn.insert_entity_with_id(user_id, &mark)
            }
        })?;

        self.notifications.add(user_id, UNREAD_MESSAGE_COUNT, json!(0))?;
        Ok(mark.last_read)
    }

    fn received(&self, user_id: i64) -> Result<Vec<Stored<Message>>> {
        let mut items: Vec<Stored<Message>> = self
            .db
            .entities::<Message>()?
            .into_iter()
            .filter(|m| m.recipient_id == user_id)
            .collect();
        items.sort_by(|a, b| {
            b.value
                .timestamp
                .cmp(&a.value.timestamp)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use nodwatch_engine::{DatabaseBuilder, NodwatchConfig};

    fn setup() -> (Messages, Notifications) {
        let mut config = NodwatchConfig::default();
        config.search.per_page = 2;
        let db = Arc::new(DatabaseBuilder::new().config(config).build().unwrap());
        let notifications = Notifications::new(Arc::clone(&db));
        (Messages::new(db, notifications.clone()), notifications)
    }

    fn unread_notification(notifications: &Notifications, user_id: i64) -> serde_json::Value {
        notifications
            .since(user_id, 0.0)
            .unwrap()
            .into_iter()
            .find(|n| n.name == UNREAD_MESSAGE_COUNT)
            .map(|n| n.value.payload)
            .unwrap()
    }

    #[test]
    fn test_send_updates_unread_count() {
        let (messages, notifications) = setup();
        messages.send_text(1, 2, "weighing moved to Friday").unwrap();
        messages.send_text(3, 2, "bring the MUAC tapes").unwrap();

        assert_eq!(messages.unread_count(2).unwrap(), 2);
        assert_eq!(unread_notification(&notifications, 2), json!(2));
        assert_eq!(messages.unread_count(1).unwrap(), 0);
    }

    #[test]
    fn test_mark_read_resets_count() {
        let (messages, notifications) = setup();
        messages.send_text(1, 2, "first").unwrap();
        assert!(messages.last_read(2).unwrap().is_none());

        let read_at = messages.mark_read(2).unwrap();
        assert_eq!(messages.last_read(2).unwrap(), Some(read_at));
        assert_eq!(messages.unread_count(2).unwrap(), 0);
        assert_eq!(unread_notification(&notifications, 2), json!(0));

        // A second mark updates the existing read mark
        messages.mark_read(2).unwrap();

        let mut later = Message::new(1, 2, "second");
        later.timestamp = Utc::now() + Duration::seconds(1);
        messages.send(&later).unwrap();
        assert_eq!(messages.unread_count(2).unwrap(), 1);
        assert_eq!(unread_notification(&notifications, 2), json!(1));
    }

    #[test]
    fn test_received_since() {
        let (messages, _) = setup();
        let mut old = Message::new(1, 2, "old");
        old.timestamp = Utc::now() - Duration::days(2);
        messages.send(&old).unwrap();
        messages.send_text(1, 2, "new").unwrap();

        let yesterday = Utc::now() - Duration::days(1);
        assert_eq!(messages.received_since(2, yesterday).unwrap(), 1);
    }

    #[test]
    fn test_inbox_newest_first_and_paged() {
        let (messages, _) = setup();
        let now = Utc::now();
        for (n, body) in ["one", "two", "three"].iter().enumerate() {
            let mut message = Message::new(1, 2, *body);
            message.timestamp = now + Duration::seconds(n as i64);
            messages.send(&message).unwrap();
        }
        messages.send_text(2, 1, "reply").unwrap();

        let first = messages.inbox(2, 1).unwrap();
        assert_eq!(first.total, 3);
        let bodies: Vec<&str> = first.items.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["three", "two"]);
        assert!(first.has_next());

        let second = messages.inbox(2, 2).unwrap();
        assert_eq!(second.items[0].body, "one");
        assert!(!second.has_next());
    }
}
