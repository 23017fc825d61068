//! HTTP services.
//!
//! - `plants`: scan lookup, image upload and image removal on `PlantList` records.
//! - `statics`: the service greeting and the uploaded files themselves.

pub mod plants;
pub mod statics;

use crate::error::ApiError;
use actix_web::web;

/// JSON bodies above this size are rejected.
const JSON_LIMIT: usize = 1024 * 1024;

/// JSON extractor settings shared by all handlers: malformed bodies become `InvalidPayload`.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_LIMIT)
        .error_handler(|err, _req| ApiError::InvalidPayload(err.to_string()).into())
}
