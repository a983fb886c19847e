//! Shared API types
//!
//! Pagination, timestamp parsing, and the validators applied by the schema
//! layer before requests reach the repositories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::ValidationError;

use super::error::ApiError;

/// Maximum items per page for paginated endpoints
pub const MAX_PAGE_LIMIT: u32 = 200;
/// Default page number
pub const DEFAULT_PAGE: u32 = 1;
/// Default items per page
pub const DEFAULT_LIMIT: u32 = 50;

pub fn default_page() -> u32 {
    DEFAULT_PAGE
}

pub fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

/// Parse an optional RFC 3339 timestamp query parameter into unix seconds
pub fn parse_timestamp_param(
    s: &Option<String>,
    name: &str,
) -> Result<Option<i64>, ApiError> {
    match s {
        Some(ts) => DateTime::parse_from_rfc3339(ts)
            .map(|dt| Some(dt.with_timezone(&Utc).timestamp()))
            .map_err(|_| {
                ApiError::validation(format!(
                    "Invalid {name}: {ts}. Use ISO 8601 format."
                ))
            }),
        None => Ok(None),
    }
}

/// Validator function for page parameters
pub fn validate_page(page: u32) -> Result<(), ValidationError> {
    if page < 1 {
        return Err(ValidationError::new("page_min").with_message("Page must be >= 1".into()));
    }
    Ok(())
}

/// Validator function for limit parameters
pub fn validate_limit(limit: u32) -> Result<(), ValidationError> {
    if limit == 0 || limit > MAX_PAGE_LIMIT {
        return Err(ValidationError::new("limit_range")
            .with_message(format!("Limit must be between 1 and {MAX_PAGE_LIMIT}").into()));
    }
    Ok(())
}

/// Validator function for sampling temperature
pub fn validate_temperature(temperature: f64) -> Result<(), ValidationError> {
    if !(0.0..=2.0).contains(&temperature) {
        return Err(ValidationError::new("temperature_range")
            .with_message("Temperature must be between 0 and 2".into()));
    }
    Ok(())
}

/// Validator function for completion token caps
pub fn validate_max_tokens(max_tokens: i64) -> Result<(), ValidationError> {
    if max_tokens < 1 {
        return Err(ValidationError::new("max_tokens_min")
            .with_message("max_tokens must be positive".into()));
    }
    Ok(())
}

/// Map validator output into the canonical envelope
pub fn reject_invalid(errors: validator::ValidationErrors) -> ApiError {
    ApiError::validation(errors.to_string())
}

/// Optional-field variants of the numeric validators, for fields the
/// derive cannot reach
pub fn check_temperature(temperature: Option<f64>) -> Result<(), ApiError> {
    match temperature {
        Some(t) => validate_temperature(t).map_err(|e| ApiError::validation(e.to_string())),
        None => Ok(()),
    }
}

pub fn check_max_tokens(max_tokens: Option<i64>) -> Result<(), ApiError> {
    match max_tokens {
        Some(m) => validate_max_tokens(m).map_err(|e| ApiError::validation(e.to_string())),
        None => Ok(()),
    }
}

/// Deserializer for patch fields where an absent key means "leave as is"
/// and an explicit null means "clear". Use with `#[serde(default)]`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Pagination metadata in responses
#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub limit: u32,
    pub total_items: u64,
    pub total_pages: u64,
}

impl PaginationMeta {
    pub fn new(page: u32, limit: u32, total_items: u64) -> Self {
        Self {
            page,
            limit,
            total_items,
            total_pages: total_items.div_ceil(limit as u64),
        }
    }
}

/// Generic paginated response wrapper
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub meta: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: u32, limit: u32, total_items: u64) -> Self {
        Self {
            data,
            meta: PaginationMeta::new(page, limit, total_items),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_param() {
        let ts = parse_timestamp_param(&Some("2026-01-01T00:00:00Z".to_string()), "start_date")
            .unwrap()
            .unwrap();
        assert_eq!(ts, 1_767_225_600);

        assert_eq!(parse_timestamp_param(&None, "start_date").unwrap(), None);
        assert!(parse_timestamp_param(&Some("yesterday".to_string()), "start_date").is_err());
    }

    #[test]
    fn test_validate_limit_bounds() {
        assert!(validate_limit(1).is_ok());
        assert!(validate_limit(200).is_ok());
        assert!(validate_limit(0).is_err());
        assert!(validate_limit(201).is_err());
    }

    #[test]
    fn test_validate_temperature_bounds() {
        assert!(validate_temperature(0.0).is_ok());
        assert!(validate_temperature(2.0).is_ok());
        assert!(validate_temperature(-0.1).is_err());
        assert!(validate_temperature(2.1).is_err());
    }

    #[test]
    fn test_pagination_meta() {
        let meta = PaginationMeta::new(2, 50, 120);
        assert_eq!(meta.total_pages, 3);
    }
}
