use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::{ImageStoreError, LinkUpdateError};
use actix_web::{web, HttpResponse};
use common::model::image_links::{remove, ImageLinks};
use common::model::plant::ParsedIdentifiers;
use common::requests::{DeleteImageRequest, DeleteImageResponse};
use log::{info, warn};

const ENDPOINT: &str = "/delete-image";

pub(crate) async fn process(
    state: web::Data<AppState>,
    body: web::Json<DeleteImageRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();
    let image_url = request.image_url.filter(|u| !u.is_empty()).ok_or_else(|| {
        warn!("{ENDPOINT}: missing imageUrl");
        ApiError::InvalidPayload("field 'imageUrl' is required".to_string())
    })?;
    let ids = state.parser.parse(&request.ids).into_result().map_err(|e| {
        warn!("{ENDPOINT}: rejected ids: {e}");
        ApiError::from(e)
    })?;
    state.images.path_for(&image_url).map_err(invalid_url)?;

    // Nothing is touched unless the record exists and lists the URL.
    ensure_linked(&state, &ids, &image_url).await?;

    state
        .images
        .delete(&image_url)
        .await
        .map_err(|e| match e {
            ImageStoreError::InvalidUrl(_) => invalid_url(e),
            other => ApiError::file_operation(ENDPOINT, &ids, other),
        })?;

    remove_link(&state, &ids, &image_url).await?;

    info!("{ENDPOINT}: removed {image_url} from {ids}");
    Ok(HttpResponse::Ok().json(DeleteImageResponse {
        success: true,
        message: "Image deleted successfully".to_string(),
    }))
}

fn invalid_url(e: ImageStoreError) -> ApiError {
    warn!("{ENDPOINT}: {e}");
    ApiError::InvalidPayload(e.to_string())
}

async fn ensure_linked(state: &AppState, ids: &ParsedIdentifiers, url: &str) -> Result<(), ApiError> {
    let store = state.store.clone();
    let key = ids.clone();
    let column = web::block(move || store.find_image_links(&key))
        .await
        .map_err(|e| ApiError::storage(ENDPOINT, Some(ids), e))?
        .map_err(|e| ApiError::storage(ENDPOINT, Some(ids), e))?;

    let Some(column) = column else {
        info!("{ENDPOINT}: no plant for {ids}");
        return Err(ApiError::RecordNotFound);
    };
    if !ImageLinks::from_column(column.as_deref()).contains(url) {
        info!("{ENDPOINT}: {url} is not linked to {ids}");
        return Err(ApiError::ImageNotFound);
    }
    Ok(())
}

async fn remove_link(state: &AppState, ids: &ParsedIdentifiers, url: &str) -> Result<(), ApiError> {
    let store = state.store.clone();
    let key = ids.clone();
    let link = url.to_string();
    let result = web::block(move || {
        store.modify_image_links(&key, |existing| Ok(remove(existing, &link)?))
    })
    .await
    .map_err(|e| ApiError::storage(ENDPOINT, Some(ids), e))?;

    match result {
        Ok(_) => Ok(()),
        Err(LinkUpdateError::RecordNotFound) => {
            warn!("{ENDPOINT}: {url} was deleted but no plant matches {ids}");
            Err(ApiError::RecordNotFound)
        }
        Err(e) => Err(ApiError::storage(ENDPOINT, Some(ids), e)),
    }
}
