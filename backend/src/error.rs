//! HTTP-facing error type.
//!
//! Every handler returns `Result<_, ApiError>`; actix turns the error into exactly one JSON
//! response `{ "error": <kind>, "message": <text> }`. Storage and file failures are logged with
//! their detail where they are raised and reach the caller only as a generic message.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use common::model::plant::ParsedIdentifiers;
use common::requests::ErrorBody;
use common::scan::InvalidPayload;
use log::error;
use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidPayload(String),
    #[error("Plant not found")]
    RecordNotFound,
    #[error("Image is not linked to this plant")]
    ImageNotFound,
    #[error("File exceeds the upload limit of {0} bytes")]
    PayloadTooLarge(usize),
    #[error("Storage error")]
    Storage,
    #[error("Failed to delete image file")]
    FileOperation,
}

impl ApiError {
    /// Logs a record or blob store failure with the endpoint and key it happened on.
    pub fn storage(endpoint: &str, key: Option<&ParsedIdentifiers>, err: impl Display) -> Self {
        match key {
            Some(key) => error!("{endpoint}: storage failure for {key}: {err}"),
            None => error!("{endpoint}: storage failure: {err}"),
        }
        ApiError::Storage
    }

    pub fn file_operation(endpoint: &str, key: &ParsedIdentifiers, err: impl Display) -> Self {
        error!("{endpoint}: file operation failed for {key}: {err}");
        ApiError::FileOperation
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidPayload(_) => "InvalidPayload",
            ApiError::RecordNotFound => "RecordNotFound",
            ApiError::ImageNotFound => "ImageNotFound",
            ApiError::PayloadTooLarge(_) => "PayloadTooLarge",
            ApiError::Storage => "StorageError",
            ApiError::FileOperation => "FileOperationError",
        }
    }
}

impl From<InvalidPayload> for ApiError {
    fn from(e: InvalidPayload) -> Self {
        ApiError::InvalidPayload(e.to_string())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::RecordNotFound | ApiError::ImageNotFound => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Storage | ApiError::FileOperation => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.kind().to_string(),
            message: self.to_string(),
        })
    }
}
