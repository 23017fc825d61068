mod config;
mod cors;
mod error;
mod services;
mod state;
mod storage;

use crate::config::Config;
use crate::state::AppState;
use crate::storage::{ImageStore, PlantStore};
use actix_web::{middleware, web, App, HttpServer};
use common::scan::ScanParser;
use env_logger::Env;
use log::{info, warn};
use std::io;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::load().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    if !config.db_tls_verify {
        warn!("DB_TLS_VERIFY is disabled but has no effect on a SQLite database");
    }

    // Open the record store and make sure the table exists
    let store = Arc::new(PlantStore::open(&config.database_url).map_err(io::Error::other)?);
    store.ensure_schema().map_err(io::Error::other)?;
    info!("Connected to the SQLite database at {}", config.database_url);

    let images = Arc::new(ImageStore::new(&config.upload_dir, config.max_upload_bytes)?);
    info!("Serving uploads from {}", images.dir().display());

    let parser = ScanParser::new(config.scan_fields.clone()).map_err(io::Error::other)?;
    let state = AppState {
        store: store.clone(),
        images,
        parser: Arc::new(parser),
    };

    let origins = config.allowed_origins.clone();
    let upload_dir = config.upload_dir.clone();
    info!(
        "Server is running on {}:{} (allowed origins: {})",
        config.host,
        config.port,
        origins.join(", ")
    );

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors::build(&origins))
            .app_data(services::json_config())
            .app_data(web::Data::new(state.clone()))
            .service(services::plants::configure_routes())
            .service(services::statics::configure_routes(upload_dir.clone()))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    info!("Server stopped, closing the database");
    store.close().map_err(io::Error::other)
}
