use axum::extract::{Multipart, Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

use crate::db::models::ContentBlock;
use crate::error::{AppError, AppResult};
use crate::extractors::AdminUser;
use crate::state::AppState;
use crate::storage;

#[derive(Deserialize)]
struct UpdateContentRequest {
    title: String,
    content: String,
}

/// All content blocks keyed by slot. Public: the marketing pages render these.
async fn get_content(
    State(state): State<AppState>,
) -> AppResult<Json<BTreeMap<String, ContentBlock>>> {
    let content = state.site.content().await?;
    Ok(Json(content))
}

async fn update_content(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(key): Path<String>,
    Json(req): Json<UpdateContentRequest>,
) -> AppResult<Json<ContentBlock>> {
    state
        .site
        .update_content(&key, &req.title, &req.content)
        .await?;
    let block = state.site.block(&key).await?;
    Ok(Json(block))
}

async fn get_logo(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let url = state.site.logo_url().await?;
    Ok(Json(json!({ "logo_url": url })))
}

/// Replace the site logo: store the file under its fixed name, then record the
/// public URL in settings. If the settings write fails the stored object is
/// deleted again so no orphan is left behind.
async fn upload_logo(
    State(state): State<AppState>,
    _admin: AdminUser,
    mut multipart: Multipart,
) -> AppResult<Json<serde_json::Value>> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .ok_or_else(|| AppError::BadRequest("File name required".into()))?
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;
        upload = Some((filename, bytes.to_vec()));
    }

    let (filename, bytes) = upload
        .ok_or_else(|| AppError::BadRequest("Missing 'file' field".into()))?;
    if bytes.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".into()));
    }

    let name = storage::logo_object_name(&filename)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    state
        .uploads
        .put(&name, &bytes)
        .await
        .map_err(|e| AppError::Internal(format!("Upload failed: {}", e)))?;

    let url = state.uploads.public_url(&name);
    if let Err(e) = state.site.set_logo_url(&url).await {
        // Compensate: do not leave an uploaded file with no referencing row
        if let Err(cleanup) = state.uploads.delete(&name).await {
            tracing::error!("Failed to clean up orphaned logo upload: {}", cleanup);
        }
        return Err(e.into());
    }

    tracing::info!("Site logo replaced: {}", url);
    Ok(Json(json!({ "logo_url": url })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/content", get(get_content))
        .route("/api/content/{key}", axum::routing::put(update_content))
        .route("/api/settings/logo", get(get_logo).post(upload_logo))
}
