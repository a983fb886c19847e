//! Message repository

use sqlx::SqlitePool;

use crate::data::sqlite::StoreError;
use crate::data::types::{MessageRow, Role};

type MessageTuple = (String, String, String, String, i64);

fn row_from_tuple(t: MessageTuple) -> Result<MessageRow, StoreError> {
    let (id, session_id, role, content, created_at) = t;
    let role = Role::parse(&role)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown role {role:?}").into()))?;
    Ok(MessageRow {
        id,
        session_id,
        role,
        content,
        created_at,
    })
}

const SELECT_COLUMNS: &str = "id, session_id, role, content, created_at";

/// Append a message to a session
pub async fn append_message(
    pool: &SqlitePool,
    session_id: &str,
    role: Role,
    content: &str,
) -> Result<MessageRow, StoreError> {
    let id = cuid2::create_id();
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        "INSERT INTO messages (id, session_id, role, content, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(session_id)
    .bind(role.as_str())
    .bind(content)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(MessageRow {
        id,
        session_id: session_id.to_string(),
        role,
        content: content.to_string(),
        created_at: now,
    })
}

/// List a session's messages in their total order `(created_at, id)`
pub async fn list_for_session(
    pool: &SqlitePool,
    session_id: &str,
) -> Result<Vec<MessageRow>, StoreError> {
    let rows = sqlx::query_as::<_, MessageTuple>(&format!(
        "SELECT {SELECT_COLUMNS} FROM messages WHERE session_id = ? ORDER BY created_at ASC, id ASC"
    ))
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_from_tuple).collect()
}

pub async fn get_message(pool: &SqlitePool, id: &str) -> Result<Option<MessageRow>, StoreError> {
    let row = sqlx::query_as::<_, MessageTuple>(&format!(
        "SELECT {SELECT_COLUMNS} FROM messages WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(row_from_tuple).transpose()
}

pub async fn delete_message(pool: &SqlitePool, id: &str) -> Result<bool, StoreError> {
    let result = sqlx::query("DELETE FROM messages WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
