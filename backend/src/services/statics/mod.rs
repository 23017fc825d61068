//! Non-API routes: the greeting at `/` and the uploaded images under `/uploads`.

use crate::storage::images::URL_PREFIX;
use actix_files::Files;
use actix_web::dev::HttpServiceFactory;
use actix_web::web::{get, resource};
use actix_web::HttpResponse;
use std::path::PathBuf;

pub const GREETING: &str = "Plant nursery inventory service";

async fn greeting() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(GREETING)
}

/// `GET /` and the static file service over `upload_dir`. Missing files are `404`.
pub fn configure_routes(upload_dir: PathBuf) -> impl HttpServiceFactory {
    (
        resource("/").route(get().to(greeting)),
        Files::new(URL_PREFIX, upload_dir),
    )
}
