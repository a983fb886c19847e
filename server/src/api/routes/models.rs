//! Model catalog endpoints

use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::data::sqlite::repositories::model::{self, ModelFilter};
use crate::data::types::ModelRow;

#[derive(Debug, Deserialize)]
pub struct ListModelsQuery {
    pub reasoning: Option<bool>,
    pub min_context: Option<i64>,
    pub max_price: Option<f64>,
}

/// GET /api/models
pub async fn list_models(
    State(state): State<AppState>,
    Query(query): Query<ListModelsQuery>,
) -> Result<Json<Vec<ModelRow>>, ApiError> {
    let filter = ModelFilter {
        reasoning: query.reasoning,
        min_context: query.min_context,
        max_price: query.max_price,
    };

    let models = model::list_models(state.pool(), Some(&state.models_cache), &filter).await?;
    Ok(Json(models))
}

#[derive(Serialize)]
pub struct SyncResponse {
    pub synced: usize,
}

/// POST /api/models/sync: refresh the catalog from the provider
pub async fn sync_models(State(state): State<AppState>) -> Result<Json<SyncResponse>, ApiError> {
    let catalog = state.openrouter.list_models().await?;
    let now = chrono::Utc::now().timestamp();

    let rows: Vec<_> = catalog.into_iter().map(|m| m.into_row(now)).collect();
    let synced = model::sync_catalog(state.pool(), Some(&state.models_cache), &rows).await?;

    tracing::info!(synced, "Model catalog refreshed");
    Ok(Json(SyncResponse { synced }))
}
