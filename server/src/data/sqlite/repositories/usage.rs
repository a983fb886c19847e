//! Usage accounting repository
//!
//! One row per successful completion; rows are append-only. Summary queries
//! aggregate in SQL so the gateway never pages raw rows for charts.

use sqlx::SqlitePool;

use crate::data::sqlite::StoreError;
use crate::data::types::{ModelUsage, UsagePeriod, UsageRow, UsageTotals};

/// Options for appending a usage row. `total_tokens` is always computed as
/// the sum of the parts.
#[derive(Debug, Clone)]
pub struct NewUsage {
    pub session_id: String,
    pub profile_id: Option<i64>,
    pub model_id: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub cost_usd: f64,
}

/// Timeline bucket size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageGroup {
    Day,
    Week,
    Month,
}

impl UsageGroup {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "day" => Some(UsageGroup::Day),
            "week" => Some(UsageGroup::Week),
            "month" => Some(UsageGroup::Month),
            _ => None,
        }
    }

    /// strftime pattern producing the period label
    fn format_sql(&self) -> &'static str {
        match self {
            UsageGroup::Day => "%Y-%m-%d",
            UsageGroup::Week => "%Y-W%W",
            UsageGroup::Month => "%Y-%m",
        }
    }
}

type UsageTuple = (
    String,
    String,
    Option<i64>,
    String,
    i64,
    i64,
    i64,
    f64,
    i64,
);

fn row_from_tuple(t: UsageTuple) -> UsageRow {
    let (
        id,
        session_id,
        profile_id,
        model_id,
        prompt_tokens,
        completion_tokens,
        total_tokens,
        cost_usd,
        created_at,
    ) = t;
    UsageRow {
        id,
        session_id,
        profile_id,
        model_id,
        prompt_tokens,
        completion_tokens,
        total_tokens,
        cost_usd,
        created_at,
    }
}

const SELECT_COLUMNS: &str = "id, session_id, profile_id, model_id, prompt_tokens, \
                              completion_tokens, total_tokens, cost_usd, created_at";

/// Append one accounting row
pub async fn append_usage(pool: &SqlitePool, new: NewUsage) -> Result<UsageRow, StoreError> {
    let id = cuid2::create_id();
    let now = chrono::Utc::now().timestamp();
    let total_tokens = new.prompt_tokens + new.completion_tokens;

    sqlx::query(
        "INSERT INTO usage_logs (id, session_id, profile_id, model_id, prompt_tokens, completion_tokens, total_tokens, cost_usd, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&new.session_id)
    .bind(new.profile_id)
    .bind(&new.model_id)
    .bind(new.prompt_tokens)
    .bind(new.completion_tokens)
    .bind(total_tokens)
    .bind(new.cost_usd)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(UsageRow {
        id,
        session_id: new.session_id,
        profile_id: new.profile_id,
        model_id: new.model_id,
        prompt_tokens: new.prompt_tokens,
        completion_tokens: new.completion_tokens,
        total_tokens,
        cost_usd: new.cost_usd,
        created_at: now,
    })
}

pub async fn get_usage(pool: &SqlitePool, id: &str) -> Result<Option<UsageRow>, StoreError> {
    let row = sqlx::query_as::<_, UsageTuple>(&format!(
        "SELECT {SELECT_COLUMNS} FROM usage_logs WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(row_from_tuple))
}

/// List usage rows, newest first, with pagination
pub async fn list_usage(
    pool: &SqlitePool,
    page: u32,
    limit: u32,
) -> Result<(Vec<UsageRow>, u64), StoreError> {
    let offset = (page.saturating_sub(1)) * limit;

    let rows = sqlx::query_as::<_, UsageTuple>(&format!(
        "SELECT {SELECT_COLUMNS} FROM usage_logs ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM usage_logs")
        .fetch_one(pool)
        .await?;

    Ok((
        rows.into_iter().map(row_from_tuple).collect(),
        total.0 as u64,
    ))
}

/// Usage timeline bucketed by day, week, or month over an optional range
pub async fn timeline(
    pool: &SqlitePool,
    group: UsageGroup,
    start: Option<i64>,
    end: Option<i64>,
) -> Result<Vec<UsagePeriod>, StoreError> {
    let mut builder = sqlx::QueryBuilder::new(format!(
        "SELECT strftime('{fmt}', created_at, 'unixepoch') AS period, \
                COALESCE(SUM(total_tokens), 0), \
                COALESCE(SUM(prompt_tokens), 0), \
                COALESCE(SUM(completion_tokens), 0), \
                COALESCE(SUM(cost_usd), 0.0), \
                COUNT(*) \
         FROM usage_logs WHERE 1 = 1",
        fmt = group.format_sql()
    ));

    if let Some(start) = start {
        builder.push(" AND created_at >= ");
        builder.push_bind(start);
    }
    if let Some(end) = end {
        builder.push(" AND created_at <= ");
        builder.push_bind(end);
    }

    builder.push(" GROUP BY period ORDER BY period ASC");

    let rows = builder
        .build_query_as::<(String, i64, i64, i64, f64, i64)>()
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(
            |(period, total_tokens, prompt_tokens, completion_tokens, total_cost, request_count)| {
                UsagePeriod {
                    period,
                    total_tokens,
                    prompt_tokens,
                    completion_tokens,
                    total_cost,
                    request_count,
                }
            },
        )
        .collect())
}

/// Overall usage statistics
pub async fn overall(pool: &SqlitePool) -> Result<UsageTotals, StoreError> {
    let row = sqlx::query_as::<_, (i64, i64, i64, i64, f64, i64, i64, Option<i64>, Option<i64>)>(
        "SELECT COUNT(*), \
                COALESCE(SUM(total_tokens), 0), \
                COALESCE(SUM(prompt_tokens), 0), \
                COALESCE(SUM(completion_tokens), 0), \
                COALESCE(SUM(cost_usd), 0.0), \
                COUNT(DISTINCT model_id), \
                COUNT(DISTINCT session_id), \
                MIN(created_at), \
                MAX(created_at) \
         FROM usage_logs",
    )
    .fetch_one(pool)
    .await?;

    let (
        total_requests,
        total_tokens,
        prompt_tokens,
        completion_tokens,
        total_cost,
        unique_models,
        unique_sessions,
        first_at,
        last_at,
    ) = row;

    Ok(UsageTotals {
        total_requests,
        total_tokens,
        prompt_tokens,
        completion_tokens,
        total_cost,
        unique_models,
        unique_sessions,
        avg_cost_per_request: if total_requests == 0 {
            0.0
        } else {
            total_cost / total_requests as f64
        },
        first_at,
        last_at,
    })
}

/// Per-model breakdown, most expensive first
pub async fn by_model(pool: &SqlitePool) -> Result<Vec<ModelUsage>, StoreError> {
    let rows = sqlx::query_as::<_, (String, i64, i64, f64)>(
        "SELECT model_id, COUNT(*), COALESCE(SUM(total_tokens), 0), COALESCE(SUM(cost_usd), 0) \
         FROM usage_logs GROUP BY model_id ORDER BY SUM(cost_usd) DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(model_id, request_count, total_tokens, total_cost)| ModelUsage {
            model_id,
            request_count,
            total_tokens,
            total_cost,
        })
        .collect())
}
