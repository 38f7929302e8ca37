//! Primitives layer for Nodwatch
//!
//! This crate implements the domain facades:
//! - Posts: visit notes with nutritional measurements, searchable by body
//! - Waypoints: places on the map, searchable by place name
//! - Tasks: background jobs with progress, as seen by their owner
//! - Notifications: named per-user payloads, replaced on update
//! - Messages: caregiver-to-caregiver messages with an unread count
//!
//! All primitives are stateless facades over the Database engine.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod authored;
pub mod messages;
pub mod notifications;
pub mod posts;
pub mod tasks;
pub mod waypoints;

pub use messages::{Message, Messages, ReadMark, UNREAD_MESSAGE_COUNT};
pub use notifications::{unix_now, Notification, Notifications};
pub use posts::{Post, PostStore};
pub use tasks::{Task, TaskBoard};
pub use waypoints::{Waypoint, WaypointStore, DEFAULT_COLOR, DEFAULT_PICTURE};
