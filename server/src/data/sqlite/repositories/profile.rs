//! Profile repository
//!
//! Reads go through the `profiles` cache; any mutation invalidates both the
//! single-profile key and the list-all key.

use sqlx::SqlitePool;

use crate::core::constants::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::data::cache::{CacheKey, TtlCache};
use crate::data::sqlite::StoreError;
use crate::data::types::ProfileRow;

/// Options for creating a profile
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub name: String,
    pub system_prompt: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
    pub preset: Option<String>,
}

/// Partial update; `None` leaves a field unchanged, `Some(None)` clears an
/// optional field
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub system_prompt: Option<Option<String>>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
    pub preset: Option<Option<String>>,
}

type ProfileTuple = (
    i64,
    String,
    Option<String>,
    f64,
    i64,
    Option<String>,
    i64,
    i64,
);

fn row_from_tuple(t: ProfileTuple) -> ProfileRow {
    let (id, name, system_prompt, temperature, max_tokens, preset, created_at, updated_at) = t;
    ProfileRow {
        id,
        name,
        system_prompt,
        temperature,
        max_tokens,
        preset,
        created_at,
        updated_at,
    }
}

const SELECT_COLUMNS: &str =
    "id, name, system_prompt, temperature, max_tokens, preset, created_at, updated_at";

pub async fn create_profile(
    pool: &SqlitePool,
    cache: Option<&TtlCache>,
    new: NewProfile,
) -> Result<ProfileRow, StoreError> {
    let now = chrono::Utc::now().timestamp();
    let temperature = new.temperature.unwrap_or(DEFAULT_TEMPERATURE);
    let max_tokens = new.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO profiles (name, system_prompt, temperature, max_tokens, preset, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&new.name)
    .bind(&new.system_prompt)
    .bind(temperature)
    .bind(max_tokens)
    .bind(&new.preset)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;

    if let Some(cache) = cache {
        cache.invalidate(&CacheKey::profiles_all()).await;
    }

    Ok(ProfileRow {
        id,
        name: new.name,
        system_prompt: new.system_prompt,
        temperature,
        max_tokens,
        preset: new.preset,
        created_at: now,
        updated_at: now,
    })
}

/// Get a profile by id (cache-aside)
pub async fn get_profile(
    pool: &SqlitePool,
    cache: Option<&TtlCache>,
    id: i64,
) -> Result<Option<ProfileRow>, StoreError> {
    if let Some(cache) = cache {
        let key = CacheKey::profile(id);

        if let Some(profile) = cache.get::<ProfileRow>(&key).await {
            tracing::trace!(%id, "Profile cache hit");
            return Ok(Some(profile));
        }

        let result = get_profile_from_db(pool, id).await?;
        if let Some(ref profile) = result {
            cache.set_logged(&key, profile).await;
        }
        Ok(result)
    } else {
        get_profile_from_db(pool, id).await
    }
}

async fn get_profile_from_db(
    pool: &SqlitePool,
    id: i64,
) -> Result<Option<ProfileRow>, StoreError> {
    let row = sqlx::query_as::<_, ProfileTuple>(&format!(
        "SELECT {SELECT_COLUMNS} FROM profiles WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(row_from_tuple))
}

/// List all profiles, newest first (cache-aside)
pub async fn list_profiles(
    pool: &SqlitePool,
    cache: Option<&TtlCache>,
) -> Result<Vec<ProfileRow>, StoreError> {
    if let Some(cache) = cache {
        let key = CacheKey::profiles_all();

        if let Some(profiles) = cache.get::<Vec<ProfileRow>>(&key).await {
            tracing::trace!("Profile list cache hit");
            return Ok(profiles);
        }

        let result = list_profiles_from_db(pool).await?;
        cache.set_logged(&key, &result).await;
        Ok(result)
    } else {
        list_profiles_from_db(pool).await
    }
}

async fn list_profiles_from_db(pool: &SqlitePool) -> Result<Vec<ProfileRow>, StoreError> {
    let rows = sqlx::query_as::<_, ProfileTuple>(&format!(
        "SELECT {SELECT_COLUMNS} FROM profiles ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_from_tuple).collect())
}

/// Apply a partial update. Returns the updated profile, or None if absent.
pub async fn update_profile(
    pool: &SqlitePool,
    cache: Option<&TtlCache>,
    id: i64,
    patch: ProfilePatch,
) -> Result<Option<ProfileRow>, StoreError> {
    let Some(current) = get_profile_from_db(pool, id).await? else {
        return Ok(None);
    };

    let name = patch.name.unwrap_or(current.name);
    let system_prompt = patch.system_prompt.unwrap_or(current.system_prompt);
    let temperature = patch.temperature.unwrap_or(current.temperature);
    let max_tokens = patch.max_tokens.unwrap_or(current.max_tokens);
    let preset = patch.preset.unwrap_or(current.preset);
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        "UPDATE profiles SET name = ?, system_prompt = ?, temperature = ?, max_tokens = ?, preset = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(&name)
    .bind(&system_prompt)
    .bind(temperature)
    .bind(max_tokens)
    .bind(&preset)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    invalidate_profile_keys(cache, id).await;

    Ok(Some(ProfileRow {
        id,
        name,
        system_prompt,
        temperature,
        max_tokens,
        preset,
        created_at: current.created_at,
        updated_at: now,
    }))
}

/// Delete a profile. Sessions referencing it fall back to no profile via
/// the SET NULL foreign key.
pub async fn delete_profile(
    pool: &SqlitePool,
    cache: Option<&TtlCache>,
    id: i64,
) -> Result<bool, StoreError> {
    let result = sqlx::query("DELETE FROM profiles WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    let deleted = result.rows_affected() > 0;
    if deleted {
        invalidate_profile_keys(cache, id).await;
    }

    Ok(deleted)
}

async fn invalidate_profile_keys(cache: Option<&TtlCache>, id: i64) {
    if let Some(cache) = cache {
        cache.invalidate(&CacheKey::profile(id)).await;
        cache.invalidate(&CacheKey::profiles_all()).await;
    }
}
