use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of `DELETE /delete-image`.
///
/// The record key is carried in the remaining fields under any accepted id name pair, so they
/// are kept as a raw map and handed to the scan parser.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteImageRequest {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(flatten)]
    pub ids: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub image_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteImageResponse {
    pub success: bool,
    pub message: String,
}

/// JSON body of every error response: a stable kind plus a message safe to show the caller.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}
