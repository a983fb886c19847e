//! Usage accounting endpoints

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use validator::Validate;

use crate::api::AppState;
use crate::api::error::ApiError;
use crate::api::types::{
    PaginatedResponse, default_limit, default_page, parse_timestamp_param, reject_invalid,
    validate_limit, validate_page,
};
use crate::data::sqlite::repositories::usage::{self, UsageGroup};
use crate::data::types::{ModelUsage, UsagePeriod, UsageRow, UsageTotals};

#[derive(Debug, Deserialize, Validate)]
pub struct ListUsageQuery {
    #[serde(default = "default_page")]
    #[validate(custom(function = "validate_page"))]
    pub page: u32,
    #[serde(default = "default_limit")]
    #[validate(custom(function = "validate_limit"))]
    pub limit: u32,
}

/// GET /api/usage
pub async fn list_usage(
    State(state): State<AppState>,
    Query(query): Query<ListUsageQuery>,
) -> Result<Json<PaginatedResponse<UsageRow>>, ApiError> {
    query.validate().map_err(reject_invalid)?;

    let (rows, total) = usage::list_usage(state.pool(), query.page, query.limit).await?;
    Ok(Json(PaginatedResponse::new(
        rows,
        query.page,
        query.limit,
        total,
    )))
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub group_by: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// GET /api/usage/summary: timeline grouped by day, week, or month
pub async fn usage_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<Vec<UsagePeriod>>, ApiError> {
    let group = match query.group_by.as_deref() {
        None => UsageGroup::Day,
        Some(raw) => UsageGroup::parse(raw).ok_or_else(|| {
            ApiError::validation(format!(
                "Unknown group_by {raw:?}; expected day, week, or month"
            ))
        })?,
    };

    let start = parse_timestamp_param(&query.start_date, "start_date")?;
    let end = parse_timestamp_param(&query.end_date, "end_date")?;

    let periods = usage::timeline(state.pool(), group, start, end).await?;
    Ok(Json(periods))
}

/// GET /api/usage/stats: overall totals
pub async fn usage_stats(State(state): State<AppState>) -> Result<Json<UsageTotals>, ApiError> {
    let totals = usage::overall(state.pool()).await?;
    Ok(Json(totals))
}

/// GET /api/usage/models: per-model breakdown
pub async fn usage_by_model(
    State(state): State<AppState>,
) -> Result<Json<Vec<ModelUsage>>, ApiError> {
    let breakdown = usage::by_model(state.pool()).await?;
    Ok(Json(breakdown))
}

/// GET /api/usage/{id}
pub async fn get_usage(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UsageRow>, ApiError> {
    let row = usage::get_usage(state.pool(), &id)
        .await?
        .ok_or_else(|| ApiError::usage_log_not_found(&id))?;
    Ok(Json(row))
}
