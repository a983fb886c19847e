//! Session CRUD endpoints

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use validator::Validate;

use crate::api::AppState;
use crate::api::error::ApiError;
use crate::api::types::reject_invalid;
use crate::data::sqlite::repositories::{profile, session};
use crate::data::types::{SessionRow, SessionType};

fn parse_session_type(raw: &str) -> Result<SessionType, ApiError> {
    SessionType::parse(raw).ok_or_else(|| {
        ApiError::validation(format!(
            "Unknown session type {raw:?}; expected chat, code, documents, or playground"
        ))
    })
}

/// Creating or retargeting a session verifies the profile exists so the
/// reference can never dangle silently
async fn ensure_profile_exists(state: &AppState, id: i64) -> Result<(), ApiError> {
    profile::get_profile(state.pool(), Some(&state.profiles_cache), id)
        .await?
        .map(|_| ())
        .ok_or_else(|| ApiError::profile_not_found(id))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionRequest {
    pub session_type: Option<String>,
    #[validate(length(max = 200))]
    pub title: Option<String>,
    pub profile_id: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSessionRequest {
    #[serde(default, deserialize_with = "crate::api::types::double_option")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::api::types::double_option")]
    pub profile_id: Option<Option<i64>>,
}

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub session_type: Option<String>,
}

/// POST /api/sessions
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionRow>), ApiError> {
    request.validate().map_err(reject_invalid)?;

    let session_type = match request.session_type.as_deref() {
        Some(raw) => parse_session_type(raw)?,
        None => SessionType::Chat,
    };

    if let Some(profile_id) = request.profile_id {
        ensure_profile_exists(&state, profile_id).await?;
    }

    let session = session::create_session(
        state.pool(),
        session::NewSession {
            session_type,
            title: request.title,
            profile_id: request.profile_id,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Vec<SessionRow>>, ApiError> {
    let session_type = query
        .session_type
        .as_deref()
        .map(parse_session_type)
        .transpose()?;

    let sessions = session::list_sessions(state.pool(), session_type).await?;
    Ok(Json(sessions))
}

/// GET /api/sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionRow>, ApiError> {
    let session = session::get_session(state.pool(), &id)
        .await?
        .ok_or_else(|| ApiError::session_not_found(&id))?;
    Ok(Json(session))
}

/// PATCH /api/sessions/{id}
pub async fn update_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateSessionRequest>,
) -> Result<Json<SessionRow>, ApiError> {
    request.validate().map_err(reject_invalid)?;

    if let Some(Some(profile_id)) = request.profile_id {
        ensure_profile_exists(&state, profile_id).await?;
    }

    let session = session::update_session(
        state.pool(),
        &id,
        session::SessionPatch {
            title: request.title,
            profile_id: request.profile_id,
        },
    )
    .await?
    .ok_or_else(|| ApiError::session_not_found(&id))?;

    Ok(Json(session))
}

/// DELETE /api/sessions/{id}
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = session::delete_session(state.pool(), &id).await?;
    if !deleted {
        return Err(ApiError::session_not_found(&id));
    }
    Ok(StatusCode::NO_CONTENT)
}
