//! Document endpoints
//!
//! Uploads are raw bodies with the filename in the query string; the store
//! enforces the uploads-root jail and collapses escapes to not-found.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::api::AppState;
use crate::api::error::ApiError;
use crate::data::documents::DocumentMeta;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: Option<String>,
}

/// POST /api/documents?filename=...
pub async fn upload_document(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<DocumentMeta>), ApiError> {
    let filename = query.filename.ok_or_else(ApiError::missing_filename)?;
    let meta = state.documents.save(&filename, &body).await?;
    Ok((StatusCode::CREATED, Json(meta)))
}

/// GET /api/documents
pub async fn list_documents(
    State(state): State<AppState>,
) -> Result<Json<Vec<DocumentMeta>>, ApiError> {
    let documents = state.documents.list().await?;
    Ok(Json(documents))
}

/// GET /api/documents/{filename}
pub async fn get_document(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let (data, mime) = state.documents.read(&filename).await?;
    Ok(([(header::CONTENT_TYPE, mime)], data).into_response())
}

/// DELETE /api/documents/{filename}
pub async fn delete_document(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.documents.delete(&filename).await?;
    Ok(StatusCode::NO_CONTENT)
}
