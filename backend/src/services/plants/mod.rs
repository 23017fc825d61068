//! Endpoints over `PlantList` records.
//!
//! - `POST /scan`: JSON scan submission (raw `qrCodeData` or a structured id pair). Returns the
//!   matching record with all of its columns.
//! - `POST /upload`: multipart form with one image file part (`plantImage`) and the record ids as
//!   text parts. The file is stored under the upload directory and its URL appended to the
//!   record's `ImageLinks`. Returns `201 {"imageUrl": ...}`.
//! - `DELETE /delete-image`: JSON `{imageUrl, groupId, plantId}`. The record must exist and list
//!   the URL before anything is touched. Deletes the file, then removes every occurrence of the
//!   URL from `ImageLinks`. The record is not touched when the file cannot be deleted.

use actix_web::dev::HttpServiceFactory;
use actix_web::web::{delete, post, resource};

mod delete_image;
mod scan;
mod upload;


/// Returns the record endpoints, registered at the root.
pub fn configure_routes() -> impl HttpServiceFactory {
    (
        resource("/scan").route(post().to(scan::process)),
        resource("/upload").route(post().to(upload::process)),
        resource("/delete-image").route(delete().to(delete_image::process)),
    )
}
