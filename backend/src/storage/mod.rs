//! Clients for the two stores the handlers depend on: plant records in SQLite and image files
//! on disk.

pub mod images;
pub mod records;

pub use images::{ImageStore, ImageStoreError, StagedImage};
pub use records::{LinkUpdateError, PlantRow, PlantStore};
