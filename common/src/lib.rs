//! Types and parsing shared by the nursery inventory backend and its callers.
//!
//! - `scan`: turns a QR scan submission into a `(GroupID, Plant)` key.
//! - `model`: inventory identifiers and the comma-joined `ImageLinks` field.
//! - `requests`: JSON bodies exchanged over HTTP.

pub mod model;
pub mod requests;
pub mod scan;
