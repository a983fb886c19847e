//! Error taxonomy
//!
//! A closed set of error codes with one envelope shape surfaced two ways:
//! JSON bodies on plain endpoints, and `error` SSE frames (with `status`
//! and `request_id` added) on the stream endpoint. Path-based lookups never
//! distinguish "forbidden" from "missing"; both collapse to a not-found
//! code.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value, json};

use crate::data::documents::DocumentError;
use crate::data::sqlite::StoreError;
use crate::domain::openrouter::OpenRouterError;

/// Machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    SessionNotFound,
    ProfileNotFound,
    DocumentNotFound,
    MessageNotFound,
    UsageLogNotFound,
    MissingApiKey,
    MissingFilename,
    FileSaveFailed,
    FileDeleteFailed,
    OpenRouterError,
    StreamError,
    RateLimited,
    InvalidQuery,
    ValidationError,
}

impl ErrorCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::SessionNotFound => "SESSION_NOT_FOUND",
            ErrorCode::ProfileNotFound => "PROFILE_NOT_FOUND",
            ErrorCode::DocumentNotFound => "DOCUMENT_NOT_FOUND",
            ErrorCode::MessageNotFound => "MESSAGE_NOT_FOUND",
            ErrorCode::UsageLogNotFound => "USAGE_LOG_NOT_FOUND",
            ErrorCode::MissingApiKey => "MISSING_API_KEY",
            ErrorCode::MissingFilename => "MISSING_FILENAME",
            ErrorCode::FileSaveFailed => "FILE_SAVE_FAILED",
            ErrorCode::FileDeleteFailed => "FILE_DELETE_FAILED",
            ErrorCode::OpenRouterError => "OPENROUTER_ERROR",
            ErrorCode::StreamError => "STREAM_ERROR",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::InvalidQuery => "INVALID_QUERY",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
        }
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            ErrorCode::SessionNotFound
            | ErrorCode::ProfileNotFound
            | ErrorCode::DocumentNotFound
            | ErrorCode::MessageNotFound
            | ErrorCode::UsageLogNotFound => StatusCode::NOT_FOUND,
            ErrorCode::MissingApiKey
            | ErrorCode::MissingFilename
            | ErrorCode::InvalidQuery
            | ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::FileSaveFailed | ErrorCode::FileDeleteFailed | ErrorCode::StreamError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ErrorCode::OpenRouterError => StatusCode::BAD_GATEWAY,
            ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

/// Typed error carried to either serialization surface
#[derive(Debug, Clone)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub resource_type: Option<&'static str>,
    pub resource_id: Option<String>,
    pub details: Option<Value>,
}

impl ApiError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            resource_type: None,
            resource_id: None,
            details: None,
        }
    }

    fn with_resource(mut self, resource_type: &'static str, resource_id: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type);
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn session_not_found(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(
            ErrorCode::SessionNotFound,
            format!("Session not found: {id}"),
        )
        .with_resource("session", id)
    }

    pub fn profile_not_found(id: i64) -> Self {
        Self::new(
            ErrorCode::ProfileNotFound,
            format!("Profile not found: {id}"),
        )
        .with_resource("profile", id.to_string())
    }

    pub fn document_not_found(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(
            ErrorCode::DocumentNotFound,
            format!("Document not found: {name}"),
        )
        .with_resource("document", name)
    }

    pub fn message_not_found(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(
            ErrorCode::MessageNotFound,
            format!("Message not found: {id}"),
        )
        .with_resource("message", id)
    }

    pub fn usage_log_not_found(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(
            ErrorCode::UsageLogNotFound,
            format!("Usage log not found: {id}"),
        )
        .with_resource("usage_log", id)
    }

    pub fn missing_api_key() -> Self {
        Self::new(
            ErrorCode::MissingApiKey,
            "OpenRouter API key is not configured",
        )
    }

    pub fn missing_filename() -> Self {
        Self::new(ErrorCode::MissingFilename, "Upload lacks a filename")
    }

    pub fn file_save_failed(detail: impl std::fmt::Display) -> Self {
        tracing::error!(error = %detail, "File save failed");
        Self::new(ErrorCode::FileSaveFailed, "Failed to save file")
    }

    pub fn file_delete_failed(detail: impl std::fmt::Display) -> Self {
        tracing::error!(error = %detail, "File delete failed");
        Self::new(ErrorCode::FileDeleteFailed, "Failed to delete file")
    }

    pub fn openrouter(message: impl Into<String>, upstream_status: Option<u16>) -> Self {
        let mut err = Self::new(ErrorCode::OpenRouterError, message);
        if let Some(status) = upstream_status {
            err.details = Some(json!({ "upstream_status": status }));
        }
        err
    }

    pub fn stream_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StreamError, message)
    }

    pub fn rate_limited(policy: impl Into<String>, retry_after: u64) -> Self {
        let mut err = Self::new(ErrorCode::RateLimited, "Rate limit exceeded");
        err.details = Some(json!({ "policy": policy.into(), "retry_after": retry_after }));
        err
    }

    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidQuery, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }

    /// JSON envelope for plain endpoints
    pub fn envelope(&self) -> Value {
        let mut map = Map::new();
        map.insert("error_code".into(), json!(self.code.as_str()));
        map.insert("message".into(), json!(self.message));
        if let Some(resource_type) = self.resource_type {
            map.insert("resource_type".into(), json!(resource_type));
        }
        if let Some(ref resource_id) = self.resource_id {
            map.insert("resource_id".into(), json!(resource_id));
        }
        if let Some(ref details) = self.details {
            map.insert("details".into(), details.clone());
        }
        Value::Object(map)
    }

    /// SSE `error` frame payload; adds `status` and `request_id`
    pub fn sse_payload(&self, request_id: &str) -> Value {
        let mut map = Map::new();
        map.insert("error_code".into(), json!(self.code.as_str()));
        map.insert("status".into(), json!(self.status().as_u16()));
        map.insert("message".into(), json!(self.message));
        map.insert("request_id".into(), json!(request_id));
        if let Some(resource_type) = self.resource_type {
            map.insert("resource_type".into(), json!(resource_type));
        }
        if let Some(ref resource_id) = self.resource_id {
            map.insert("resource_id".into(), json!(resource_id));
        }
        if let Some(ref details) = self.details {
            map.insert("details".into(), details.clone());
        }
        Value::Object(map)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::BadQuery(message) => Self::invalid_query(message),
            other => {
                tracing::error!(error = %other, "Store error");
                Self::stream_error("Database operation failed")
            }
        }
    }
}

impl From<DocumentError> for ApiError {
    fn from(e: DocumentError) -> Self {
        match e {
            DocumentError::NotFound { name } => Self::document_not_found(name),
            DocumentError::MissingFilename => Self::missing_filename(),
            DocumentError::Save(io) => Self::file_save_failed(io),
            DocumentError::Delete(io) => Self::file_delete_failed(io),
            DocumentError::Io(io) => {
                tracing::error!(error = %io, "Document IO error");
                Self::stream_error("Document operation failed")
            }
        }
    }
}

impl From<OpenRouterError> for ApiError {
    fn from(e: OpenRouterError) -> Self {
        match e {
            OpenRouterError::MissingApiKey => Self::missing_api_key(),
            OpenRouterError::Status { status, body } => {
                Self::openrouter(format!("OpenRouter returned status {status}: {body}"), Some(status))
            }
            OpenRouterError::Api { message, .. } => Self::openrouter(message, None),
            OpenRouterError::Transport(e) => Self::openrouter(format!("Transport error: {e}"), None),
            OpenRouterError::Decode(e) => {
                Self::openrouter(format!("Failed to decode provider chunk: {e}"), None)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.envelope())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_statuses_match_taxonomy() {
        assert_eq!(ErrorCode::SessionNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::MissingApiKey.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ErrorCode::FileSaveFailed.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ErrorCode::OpenRouterError.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            ErrorCode::RateLimited.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_envelope_carries_resource() {
        let envelope = ApiError::session_not_found("missing").envelope();
        assert_eq!(envelope["error_code"], "SESSION_NOT_FOUND");
        assert_eq!(envelope["resource_type"], "session");
        assert_eq!(envelope["resource_id"], "missing");
        assert!(envelope.get("details").is_none());
    }

    #[test]
    fn test_missing_api_key_sse_payload_shape() {
        let payload = ApiError::missing_api_key().sse_payload("req_1");
        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            "{\"error_code\":\"MISSING_API_KEY\",\"status\":400,\
             \"message\":\"OpenRouter API key is not configured\",\"request_id\":\"req_1\"}"
        );
    }

    #[test]
    fn test_sse_payload_includes_resource_id() {
        let payload = ApiError::session_not_found("missing").sse_payload("req_2");
        assert_eq!(payload["error_code"], "SESSION_NOT_FOUND");
        assert_eq!(payload["status"], 404);
        assert_eq!(payload["resource_id"], "missing");
        assert_eq!(payload["request_id"], "req_2");
    }

    #[test]
    fn test_store_bad_query_maps_to_invalid_query() {
        let err: ApiError = StoreError::BadQuery("fts5: syntax error".to_string()).into();
        assert_eq!(err.code, ErrorCode::InvalidQuery);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_openrouter_status_maps_with_details() {
        let err: ApiError = OpenRouterError::Status {
            status: 503,
            body: "overloaded".to_string(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::OpenRouterError);
        assert_eq!(err.details.unwrap()["upstream_status"], 503);
    }

    #[test]
    fn test_rate_limited_details() {
        let err = ApiError::rate_limited("10 per minute", 42);
        let details = err.details.clone().unwrap();
        assert_eq!(details["policy"], "10 per minute");
        assert_eq!(details["retry_after"], 42);
    }
}
