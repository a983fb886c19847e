//! Streaming chat endpoint
//!
//! Always answers 200 with `text/event-stream` once headers are sent, even
//! for preflight failures: browser EventSource surfaces non-2xx statuses as
//! opaque connection errors, so errors travel as a single `error` frame in
//! the body instead. Exactly one terminal frame per request.

use axum::Extension;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::Response;
use serde::Deserialize;
use validator::Validate;

use crate::api::AppState;
use crate::api::error::ApiError;
use crate::api::middleware::RequestId;
use crate::api::types::{check_max_tokens, check_temperature, reject_invalid};
use crate::domain::pipeline::{self, StreamContext, StreamParams};
use crate::domain::sse::{SseEvent, SseFrame};

#[derive(Debug, Deserialize, Validate)]
pub struct StreamQuery {
    #[validate(length(min = 1))]
    pub session_id: String,
    #[validate(length(min = 1))]
    pub model_id: String,
    pub profile_id: Option<i64>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
}

/// GET /api/stream
pub async fn stream(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(query): Query<StreamQuery>,
) -> Response {
    let checked = query
        .validate()
        .map_err(reject_invalid)
        .and_then(|()| check_temperature(query.temperature))
        .and_then(|()| check_max_tokens(query.max_tokens));
    let params = match checked {
        Ok(()) => StreamParams {
            session_id: query.session_id,
            model_id: query.model_id,
            profile_id: query.profile_id,
            temperature: query.temperature,
            max_tokens: query.max_tokens,
        },
        Err(err) => return error_response(&err, &request_id),
    };

    let prepared = match pipeline::prepare(
        state.pool(),
        &state.profiles_cache,
        state.openrouter.has_api_key(),
        &params,
    )
    .await
    {
        Ok(prepared) => prepared,
        Err(err) => {
            tracing::debug!(code = err.code.as_str(), "Stream preflight failed");
            return error_response(&err, &request_id);
        }
    };

    let ctx = StreamContext {
        pool: state.pool().clone(),
        client: state.openrouter.clone(),
        request_id,
    };

    sse_response(Body::from_stream(pipeline::run(ctx, prepared)))
}

/// Preflight failure: a 200 SSE body carrying one `error` frame, then EOF
fn error_response(err: &ApiError, request_id: &str) -> Response {
    let frame = SseFrame::new(SseEvent::Error, err.sse_payload(request_id));
    sse_response(Body::from(frame.encode()))
}

fn sse_response(body: Body) -> Response {
    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(body)
        // Infallible: static header values on a fresh builder
        .unwrap_or_else(|_| Response::new(Body::empty()))
}
