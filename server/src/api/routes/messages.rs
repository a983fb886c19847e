//! Message endpoints: per-session CRUD and full-text search

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use validator::Validate;

use crate::api::AppState;
use crate::api::error::ApiError;
use crate::api::types::{parse_timestamp_param, reject_invalid};
use crate::data::sqlite::repositories::{message, search, session};
use crate::data::types::{MessageRow, Role, SearchHit, SessionType};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMessageRequest {
    pub role: Option<String>,
    #[validate(length(min = 1))]
    pub content: String,
}

/// POST /api/sessions/{id}/messages
pub async fn create_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<CreateMessageRequest>,
) -> Result<(StatusCode, Json<MessageRow>), ApiError> {
    request.validate().map_err(reject_invalid)?;

    let role = match request.role.as_deref() {
        Some(raw) => Role::parse(raw).ok_or_else(|| {
            ApiError::validation(format!(
                "Unknown role {raw:?}; expected system, user, assistant, or tool"
            ))
        })?,
        None => Role::User,
    };

    session::get_session(state.pool(), &session_id)
        .await?
        .ok_or_else(|| ApiError::session_not_found(&session_id))?;

    let message = message::append_message(state.pool(), &session_id, role, &request.content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /api/sessions/{id}/messages
pub async fn list_messages(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<MessageRow>>, ApiError> {
    session::get_session(state.pool(), &session_id)
        .await?
        .ok_or_else(|| ApiError::session_not_found(&session_id))?;

    let messages = message::list_for_session(state.pool(), &session_id).await?;
    Ok(Json(messages))
}

/// GET /api/messages/{id}
pub async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageRow>, ApiError> {
    let message = message::get_message(state.pool(), &id)
        .await?
        .ok_or_else(|| ApiError::message_not_found(&id))?;
    Ok(Json(message))
}

/// DELETE /api/messages/{id}
pub async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = message::delete_message(state.pool(), &id).await?;
    if !deleted {
        return Err(ApiError::message_not_found(&id));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, Validate)]
pub struct SearchQuery {
    #[validate(length(min = 1))]
    pub query: String,
    pub session_id: Option<String>,
    pub session_type: Option<String>,
    pub model_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Clamped to the hard cap, not rejected
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: u32,
}

/// GET /api/messages/search
pub async fn search_messages(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<SearchHit>>, ApiError> {
    query.validate().map_err(reject_invalid)?;

    let session_type = query
        .session_type
        .as_deref()
        .map(|raw| {
            SessionType::parse(raw)
                .ok_or_else(|| ApiError::validation(format!("Unknown session type {raw:?}")))
        })
        .transpose()?;

    let filter = search::SearchFilter {
        session_type,
        session_id: query.session_id,
        model_id: query.model_id,
        start: parse_timestamp_param(&query.start_date, "start_date")?,
        end: parse_timestamp_param(&query.end_date, "end_date")?,
        limit: query.limit,
        offset: query.offset,
    };

    let hits = search::search_messages(state.pool(), &query.query, &filter).await?;
    Ok(Json(hits))
}
