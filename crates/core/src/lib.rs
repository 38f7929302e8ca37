//! Core types for Nodwatch
//!
//! Defines the types every other crate depends on:
//! - [`EntityId`] / [`EntityKey`]: record addressing
//! - [`Record`]: the stored unit (type, id, JSON data, version, timestamps)
//! - [`Entity`] / [`Stored`]: typed views over records
//! - [`SearchDescriptor`] / [`SearchRegistry`]: which fields of which types are searchable
//! - [`RecordSource`]: read access to the primary store
//! - [`Error`] / [`Result`]: the shared error type

#![warn(missing_docs)]

pub mod descriptor;
pub mod entity;
pub mod error;
#[allow(missing_docs)]
pub mod record;
pub mod traits;
pub mod types;

pub use descriptor::{FieldValues, SearchDescriptor, SearchRegistry};
pub use entity::{Entity, Stored};
pub use error::{Error, Result};
pub use record::Record;
pub use traits::RecordSource;
pub use types::{EntityId, EntityKey};
