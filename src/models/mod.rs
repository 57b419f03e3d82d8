//! Core data models for the object router.
//!
//! Identifiers, lifecycle records, stored entries and the typed form of a
//! dispatch request. All of them serialize as JSON via `serde`.

pub mod entry;
pub mod metadata;
pub mod object_id;
pub mod request;
