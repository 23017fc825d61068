//! Shared application state.
//!
//! Built once in `main.rs` and handed to every handler as `web::Data<AppState>`. Each field is an
//! explicitly constructed client; nothing is reached through globals.

use crate::storage::{ImageStore, PlantStore};
use common::scan::ScanParser;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// The `PlantList` table. Opened at startup, closed by `main` after the server stops.
    pub store: Arc<PlantStore>,
    /// Upload directory backing `/uploads/*`.
    pub images: Arc<ImageStore>,
    /// Scan submission parser with the configured field names.
    pub parser: Arc<ScanParser>,
}
