use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::PlantRow;
use actix_web::{web, HttpResponse};
use common::model::plant::ParsedIdentifiers;
use log::{info, warn};
use serde_json::{Map, Value};

const ENDPOINT: &str = "/scan";

pub(crate) async fn process(
    state: web::Data<AppState>,
    body: web::Json<Map<String, Value>>,
) -> Result<HttpResponse, ApiError> {
    let ids = state.parser.parse(&body).into_result().map_err(|e| {
        warn!("{ENDPOINT}: rejected payload: {e}");
        ApiError::from(e)
    })?;

    match find_plant(&state, &ids).await? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => {
            info!("{ENDPOINT}: no plant for {ids}");
            Err(ApiError::RecordNotFound)
        }
    }
}

async fn find_plant(
    state: &AppState,
    ids: &ParsedIdentifiers,
) -> Result<Option<PlantRow>, ApiError> {
    let store = state.store.clone();
    let key = ids.clone();
    web::block(move || store.find_one(&key))
        .await
        .map_err(|e| ApiError::storage(ENDPOINT, Some(ids), e))?
        .map_err(|e| ApiError::storage(ENDPOINT, Some(ids), e))
}
