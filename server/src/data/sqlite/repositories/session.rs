//! Session repository

use sqlx::SqlitePool;

use crate::data::sqlite::StoreError;
use crate::data::types::{SessionRow, SessionType};

/// Options for creating a session
#[derive(Debug, Clone)]
pub struct NewSession {
    pub session_type: SessionType,
    pub title: Option<String>,
    pub profile_id: Option<i64>,
}

/// Partial update; `None` leaves a field unchanged, `Some(None)` clears it
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub title: Option<Option<String>>,
    pub profile_id: Option<Option<i64>>,
}

type SessionTuple = (String, String, Option<String>, Option<i64>, i64, i64);

fn row_from_tuple(t: SessionTuple) -> Result<SessionRow, StoreError> {
    let (id, session_type, title, profile_id, created_at, updated_at) = t;
    let session_type = SessionType::parse(&session_type).ok_or_else(|| {
        sqlx::Error::Decode(format!("unknown session type {session_type:?}").into())
    })?;
    Ok(SessionRow {
        id,
        session_type,
        title,
        profile_id,
        created_at,
        updated_at,
    })
}

const SELECT_COLUMNS: &str = "id, session_type, title, profile_id, created_at, updated_at";

pub async fn create_session(pool: &SqlitePool, new: NewSession) -> Result<SessionRow, StoreError> {
    let id = cuid2::create_id();
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        "INSERT INTO sessions (id, session_type, title, profile_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(new.session_type.as_str())
    .bind(&new.title)
    .bind(new.profile_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(SessionRow {
        id,
        session_type: new.session_type,
        title: new.title,
        profile_id: new.profile_id,
        created_at: now,
        updated_at: now,
    })
}

pub async fn get_session(pool: &SqlitePool, id: &str) -> Result<Option<SessionRow>, StoreError> {
    let row = sqlx::query_as::<_, SessionTuple>(&format!(
        "SELECT {SELECT_COLUMNS} FROM sessions WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(row_from_tuple).transpose()
}

/// List sessions, newest first, optionally filtered by type
pub async fn list_sessions(
    pool: &SqlitePool,
    session_type: Option<SessionType>,
) -> Result<Vec<SessionRow>, StoreError> {
    let rows = match session_type {
        Some(st) => {
            sqlx::query_as::<_, SessionTuple>(&format!(
                "SELECT {SELECT_COLUMNS} FROM sessions WHERE session_type = ? \
                 ORDER BY created_at DESC, id DESC"
            ))
            .bind(st.as_str())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, SessionTuple>(&format!(
                "SELECT {SELECT_COLUMNS} FROM sessions ORDER BY created_at DESC, id DESC"
            ))
            .fetch_all(pool)
            .await?
        }
    };

    rows.into_iter().map(row_from_tuple).collect()
}

/// Apply a partial update. Returns the updated session, or None if absent.
pub async fn update_session(
    pool: &SqlitePool,
    id: &str,
    patch: SessionPatch,
) -> Result<Option<SessionRow>, StoreError> {
    let Some(current) = get_session(pool, id).await? else {
        return Ok(None);
    };

    let title = patch.title.unwrap_or(current.title);
    let profile_id = patch.profile_id.unwrap_or(current.profile_id);
    let now = chrono::Utc::now().timestamp();

    sqlx::query("UPDATE sessions SET title = ?, profile_id = ?, updated_at = ? WHERE id = ?")
        .bind(&title)
        .bind(profile_id)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(Some(SessionRow {
        title,
        profile_id,
        updated_at: now,
        ..current
    }))
}

/// Delete a session; messages and usage rows cascade
pub async fn delete_session(pool: &SqlitePool, id: &str) -> Result<bool, StoreError> {
    let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
