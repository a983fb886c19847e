//! Model catalog repository
//!
//! Rows are bulk upserted by catalog sync and never mutated individually.
//! The unfiltered list is cached; a sync clears the entire models cache.

use sqlx::SqlitePool;

use crate::data::cache::{CacheKey, TtlCache};
use crate::data::sqlite::StoreError;
use crate::data::types::ModelRow;

/// Catalog list filters
#[derive(Debug, Clone, Default)]
pub struct ModelFilter {
    pub reasoning: Option<bool>,
    pub min_context: Option<i64>,
    pub max_price: Option<f64>,
}

impl ModelFilter {
    fn is_empty(&self) -> bool {
        self.reasoning.is_none() && self.min_context.is_none() && self.max_price.is_none()
    }
}

type ModelTuple = (String, String, i64, Option<f64>, Option<f64>, bool, i64);

fn row_from_tuple(t: ModelTuple) -> ModelRow {
    let (id, name, context_length, prompt_price, completion_price, supports_reasoning, created_at) =
        t;
    ModelRow {
        id,
        name,
        context_length,
        prompt_price,
        completion_price,
        supports_reasoning,
        created_at,
    }
}

const SELECT_COLUMNS: &str =
    "id, name, context_length, prompt_price, completion_price, supports_reasoning, created_at";

/// Bulk upsert the catalog. Same external ids produce the same rows, so a
/// repeated sync is idempotent. Clears the whole models cache afterwards.
pub async fn sync_catalog(
    pool: &SqlitePool,
    cache: Option<&TtlCache>,
    rows: &[ModelRow],
) -> Result<usize, StoreError> {
    let mut tx = pool.begin().await?;

    for row in rows {
        sqlx::query(
            "INSERT INTO models (id, name, context_length, prompt_price, completion_price, supports_reasoning, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
                 name = excluded.name, \
                 context_length = excluded.context_length, \
                 prompt_price = excluded.prompt_price, \
                 completion_price = excluded.completion_price, \
                 supports_reasoning = excluded.supports_reasoning",
        )
        .bind(&row.id)
        .bind(&row.name)
        .bind(row.context_length)
        .bind(row.prompt_price)
        .bind(row.completion_price)
        .bind(row.supports_reasoning)
        .bind(row.created_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    if let Some(cache) = cache {
        cache.clear().await;
    }

    tracing::debug!(count = rows.len(), "Model catalog synced");
    Ok(rows.len())
}

/// List catalog rows with optional filters. Only the unfiltered list is
/// cached; filtered reads go straight to the store.
pub async fn list_models(
    pool: &SqlitePool,
    cache: Option<&TtlCache>,
    filter: &ModelFilter,
) -> Result<Vec<ModelRow>, StoreError> {
    if let Some(cache) = cache.filter(|_| filter.is_empty()) {
        let key = CacheKey::models_all();

        if let Some(models) = cache.get::<Vec<ModelRow>>(&key).await {
            tracing::trace!("Model list cache hit");
            return Ok(models);
        }

        let result = list_models_from_db(pool, filter).await?;
        cache.set_logged(&key, &result).await;
        Ok(result)
    } else {
        list_models_from_db(pool, filter).await
    }
}

async fn list_models_from_db(
    pool: &SqlitePool,
    filter: &ModelFilter,
) -> Result<Vec<ModelRow>, StoreError> {
    let mut builder = sqlx::QueryBuilder::new(format!(
        "SELECT {SELECT_COLUMNS} FROM models WHERE 1 = 1"
    ));

    if let Some(reasoning) = filter.reasoning {
        builder.push(" AND supports_reasoning = ");
        builder.push_bind(reasoning);
    }
    if let Some(min_context) = filter.min_context {
        builder.push(" AND context_length >= ");
        builder.push_bind(min_context);
    }
    if let Some(max_price) = filter.max_price {
        builder.push(" AND prompt_price IS NOT NULL AND prompt_price <= ");
        builder.push_bind(max_price);
    }

    builder.push(" ORDER BY id ASC");

    let rows = builder
        .build_query_as::<ModelTuple>()
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(row_from_tuple).collect())
}

/// Get one catalog row by external id
pub async fn get_model(pool: &SqlitePool, id: &str) -> Result<Option<ModelRow>, StoreError> {
    let row = sqlx::query_as::<_, ModelTuple>(&format!(
        "SELECT {SELECT_COLUMNS} FROM models WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(row_from_tuple))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::testutil::test_pool;

    fn catalog() -> Vec<ModelRow> {
        vec![
            ModelRow {
                id: "acme/small".to_string(),
                name: "Acme Small".to_string(),
                context_length: 8192,
                prompt_price: Some(1e-7),
                completion_price: Some(2e-7),
                supports_reasoning: false,
                created_at: 1_700_000_000,
            },
            ModelRow {
                id: "acme/large".to_string(),
                name: "Acme Large".to_string(),
                context_length: 200_000,
                prompt_price: Some(3e-6),
                completion_price: Some(1.5e-5),
                supports_reasoning: true,
                created_at: 1_700_000_000,
            },
            ModelRow {
                id: "acme/free".to_string(),
                name: "Acme Free".to_string(),
                context_length: 32_768,
                prompt_price: None,
                completion_price: None,
                supports_reasoning: false,
                created_at: 1_700_000_000,
            },
        ]
    }

    #[tokio::test]
    async fn test_sync_inserts_and_is_idempotent() {
        let pool = test_pool().await;
        let rows = catalog();

        assert_eq!(sync_catalog(&pool, None, &rows).await.unwrap(), 3);
        let first = list_models(&pool, None, &ModelFilter::default()).await.unwrap();

        // Second sync with the same external ids produces the same rows
        assert_eq!(sync_catalog(&pool, None, &rows).await.unwrap(), 3);
        let second = list_models(&pool, None, &ModelFilter::default()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(second.len(), 3);
    }

    #[tokio::test]
    async fn test_sync_updates_existing_rows() {
        let pool = test_pool().await;
        let mut rows = catalog();
        sync_catalog(&pool, None, &rows).await.unwrap();

        rows[0].name = "Acme Small v2".to_string();
        rows[0].prompt_price = Some(2e-7);
        sync_catalog(&pool, None, &rows).await.unwrap();

        let fetched = get_model(&pool, "acme/small").await.unwrap().unwrap();
        assert_eq!(fetched.name, "Acme Small v2");
        assert_eq!(fetched.prompt_price, Some(2e-7));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let pool = test_pool().await;
        sync_catalog(&pool, None, &catalog()).await.unwrap();

        let reasoning = list_models(
            &pool,
            None,
            &ModelFilter {
                reasoning: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(reasoning.len(), 1);
        assert_eq!(reasoning[0].id, "acme/large");

        let big_context = list_models(
            &pool,
            None,
            &ModelFilter {
                min_context: Some(30_000),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(big_context.len(), 2);

        let cheap = list_models(
            &pool,
            None,
            &ModelFilter {
                max_price: Some(1e-6),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(cheap.len(), 1);
        assert_eq!(cheap[0].id, "acme/small");
    }

    #[tokio::test]
    async fn test_sync_clears_model_cache() {
        use std::time::Duration;

        use crate::data::cache::TtlCache;

        let pool = test_pool().await;
        let cache = TtlCache::new("models", Duration::from_secs(300));

        sync_catalog(&pool, Some(&cache), &catalog()[..1]).await.unwrap();
        let warm = list_models(&pool, Some(&cache), &ModelFilter::default())
            .await
            .unwrap();
        assert_eq!(warm.len(), 1);

        sync_catalog(&pool, Some(&cache), &catalog()).await.unwrap();
        let fresh = list_models(&pool, Some(&cache), &ModelFilter::default())
            .await
            .unwrap();
        assert_eq!(fresh.len(), 3);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let pool = test_pool().await;
        assert!(get_model(&pool, "nope").await.unwrap().is_none());
    }
}
