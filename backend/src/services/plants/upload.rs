use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::{ImageStoreError, LinkUpdateError, StagedImage};
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use common::model::image_links::{append, remove_last};
use common::model::plant::ParsedIdentifiers;
use common::requests::UploadResponse;
use futures_util::StreamExt;
use log::{error, info, warn};
use serde_json::{Map, Value};

const ENDPOINT: &str = "/upload";

/// Part names treated as the image even when the client sends no filename.
const FILE_FIELDS: [&str; 3] = ["plantImage", "image", "file"];

/// Text parts above this size are not ids.
const TEXT_FIELD_LIMIT: usize = 4 * 1024;

/// What the multipart body contained: at most one staged image and the text parts.
struct UploadForm {
    image: Option<StagedImage>,
    fields: Map<String, Value>,
}

pub(crate) async fn process(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let form = read_form(&state, payload).await?;

    // A rejected upload drops the staged image, which removes its temporary file.
    let image = form.image.ok_or_else(|| {
        warn!("{ENDPOINT}: no file uploaded");
        ApiError::InvalidPayload("No file uploaded".to_string())
    })?;
    let ids = state.parser.parse(&form.fields).into_result().map_err(|e| {
        warn!("{ENDPOINT}: rejected ids: {e}");
        ApiError::InvalidPayload(format!("Group ID and Plant ID are required: {e}"))
    })?;

    let url = image.url().to_string();
    let size = image.size();
    append_link(&state, &ids, &url).await?;

    if let Err(e) = image.persist() {
        error!("{ENDPOINT}: could not persist {url} for {ids}: {e}");
        undo_append(&state, &ids, &url).await;
        return Err(ApiError::Storage);
    }

    info!("{ENDPOINT}: added {url} ({size} bytes) to {ids}");
    Ok(HttpResponse::Created().json(UploadResponse { image_url: url }))
}

async fn read_form(state: &AppState, mut payload: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm {
        image: None,
        fields: Map::new(),
    };

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(malformed)?;
        let (name, filename) = match field.content_disposition() {
            Some(cd) => (
                cd.get_name().map(str::to_string),
                cd.get_filename().map(str::to_string),
            ),
            None => (None, None),
        };
        let Some(name) = name else {
            while let Some(chunk) = field.next().await {
                chunk.map_err(malformed)?;
            }
            continue;
        };

        if filename.is_some() || FILE_FIELDS.contains(&name.as_str()) {
            if form.image.is_some() {
                return Err(ApiError::InvalidPayload(
                    "Only one image may be uploaded per request".to_string(),
                ));
            }
            let content_type = field.content_type().map(|m| m.essence_str().to_string());
            let staged = state
                .images
                .stage(filename.as_deref(), content_type.as_deref(), &mut field)
                .await
                .map_err(|e| staging_error(state, e))?;
            form.image = Some(staged);
        } else {
            let mut bytes = Vec::new();
            while let Some(chunk) = field.next().await {
                bytes.extend_from_slice(&chunk.map_err(malformed)?);
                if bytes.len() > TEXT_FIELD_LIMIT {
                    return Err(ApiError::InvalidPayload(format!(
                        "Field '{name}' is too large"
                    )));
                }
            }
            let value = String::from_utf8_lossy(&bytes).into_owned();
            form.fields.insert(name, Value::String(value));
        }
    }

    Ok(form)
}

fn malformed(e: impl std::fmt::Display) -> ApiError {
    warn!("{ENDPOINT}: malformed multipart body: {e}");
    ApiError::InvalidPayload(format!("Malformed multipart body: {e}"))
}

fn staging_error(state: &AppState, e: ImageStoreError) -> ApiError {
    match e {
        ImageStoreError::TooLarge { limit } => {
            warn!("{ENDPOINT}: file exceeds {limit} bytes");
            ApiError::PayloadTooLarge(state.images.max_bytes())
        }
        ImageStoreError::Stream(e) => malformed(e),
        other => ApiError::storage(ENDPOINT, None, other),
    }
}

async fn append_link(state: &AppState, ids: &ParsedIdentifiers, url: &str) -> Result<(), ApiError> {
    let store = state.store.clone();
    let key = ids.clone();
    let link = url.to_string();
    let result = web::block(move || {
        store.modify_image_links(&key, |existing| {
            let existing = existing.ok_or(LinkUpdateError::RecordNotFound)?;
            Ok(append(Some(existing), &link)?)
        })
    })
    .await
    .map_err(|e| ApiError::storage(ENDPOINT, Some(ids), e))?;

    match result {
        Ok(_) => Ok(()),
        Err(LinkUpdateError::RecordNotFound) => {
            info!("{ENDPOINT}: no plant for {ids}");
            Err(ApiError::RecordNotFound)
        }
        Err(e) => Err(ApiError::storage(ENDPOINT, Some(ids), e)),
    }
}

/// Takes the entry this request appended back out of `ImageLinks` after the file could not be
/// put in place. Earlier entries with the same URL are left alone.
async fn undo_append(state: &AppState, ids: &ParsedIdentifiers, url: &str) {
    let store = state.store.clone();
    let key = ids.clone();
    let link = url.to_string();
    let result = web::block(move || {
        store.modify_image_links(&key, |existing| Ok(remove_last(existing, &link)?))
    })
    .await;
    let outcome = match result {
        Ok(r) => r.map(drop).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    if let Err(e) = outcome {
        error!("{ENDPOINT}: could not roll back {url} for {ids}: {e}");
    }
}
