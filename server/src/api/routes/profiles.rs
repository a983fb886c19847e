//! Profile CRUD endpoints

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use validator::Validate;

use crate::api::AppState;
use crate::api::error::ApiError;
use crate::api::types::{check_max_tokens, check_temperature, reject_invalid};
use crate::data::sqlite::repositories::profile::{self, NewProfile, ProfilePatch};
use crate::data::types::ProfileRow;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub system_prompt: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
    #[validate(length(min = 1, max = 100))]
    pub preset: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    /// Present-and-null clears the prompt
    #[serde(default, deserialize_with = "crate::api::types::double_option")]
    pub system_prompt: Option<Option<String>>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
    #[serde(default, deserialize_with = "crate::api::types::double_option")]
    pub preset: Option<Option<String>>,
}

/// POST /api/profiles
pub async fn create_profile(
    State(state): State<AppState>,
    Json(request): Json<CreateProfileRequest>,
) -> Result<(StatusCode, Json<ProfileRow>), ApiError> {
    request.validate().map_err(reject_invalid)?;
    check_temperature(request.temperature)?;
    check_max_tokens(request.max_tokens)?;

    let profile = profile::create_profile(
        state.pool(),
        Some(&state.profiles_cache),
        NewProfile {
            name: request.name,
            system_prompt: request.system_prompt,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            preset: request.preset,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(profile)))
}

/// GET /api/profiles
pub async fn list_profiles(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProfileRow>>, ApiError> {
    let profiles = profile::list_profiles(state.pool(), Some(&state.profiles_cache)).await?;
    Ok(Json(profiles))
}

/// GET /api/profiles/{id}
pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ProfileRow>, ApiError> {
    let profile = profile::get_profile(state.pool(), Some(&state.profiles_cache), id)
        .await?
        .ok_or_else(|| ApiError::profile_not_found(id))?;
    Ok(Json(profile))
}

/// PUT /api/profiles/{id}
pub async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileRow>, ApiError> {
    request.validate().map_err(reject_invalid)?;
    check_temperature(request.temperature)?;
    check_max_tokens(request.max_tokens)?;

    let profile = profile::update_profile(
        state.pool(),
        Some(&state.profiles_cache),
        id,
        ProfilePatch {
            name: request.name,
            system_prompt: request.system_prompt,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            preset: request.preset,
        },
    )
    .await?
    .ok_or_else(|| ApiError::profile_not_found(id))?;

    Ok(Json(profile))
}

/// DELETE /api/profiles/{id}
pub async fn delete_profile(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let deleted = profile::delete_profile(state.pool(), Some(&state.profiles_cache), id).await?;
    if !deleted {
        return Err(ApiError::profile_not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}
