//! Rate limiting middleware
//!
//! Keyed on client IP (first `X-Forwarded-For` hop when present). Rejection
//! happens before any handler work; the 429 carries the typed envelope,
//! `Retry-After`, and `X-RateLimit-Limit` echoing the configured policy
//! string.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::error::ApiError;
use crate::core::config::RateLimitPolicy;
use crate::data::cache::{RateLimitResult, RateLimiter};

/// Per-endpoint middleware state
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub policy: RateLimitPolicy,
    pub endpoint: &'static str,
}

/// Extract the rate limit key: first X-Forwarded-For hop, else peer address
fn client_ip(request: &Request, addr: SocketAddr) -> String {
    request
        .headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| addr.ip().to_string())
}

fn set_limit_headers(response: &mut Response, policy: &RateLimitPolicy, result: &RateLimitResult) {
    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&policy.raw) {
        headers.insert("X-RateLimit-Limit", v);
    }
    if let Ok(v) = HeaderValue::from_str(&result.remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", v);
    }
    if let Ok(v) = HeaderValue::from_str(&result.reset_at.to_string()) {
        headers.insert("X-RateLimit-Reset", v);
    }
}

/// Rate limiting middleware function
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_ip(&request, addr);
    let result = state.limiter.check(&state.policy, state.endpoint, &key);

    if !result.allowed {
        tracing::debug!(endpoint = state.endpoint, %key, "Rate limit exceeded");
        let retry_after = result.retry_after.unwrap_or(state.policy.window_secs);
        let mut response =
            ApiError::rate_limited(state.policy.raw.clone(), retry_after).into_response();
        set_limit_headers(&mut response, &state.policy, &result);
        if let Ok(v) = HeaderValue::from_str(&retry_after.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, v);
        }
        return response;
    }

    let mut response = next.run(request).await;
    set_limit_headers(&mut response, &state.policy, &result);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let request = Request::builder()
            .header("X-Forwarded-For", "203.0.113.9, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        assert_eq!(client_ip(&request, addr), "203.0.113.9");
    }

    #[test]
    fn test_client_ip_falls_back_to_peer() {
        let request = Request::builder().body(Body::empty()).unwrap();
        let addr: SocketAddr = "192.168.1.7:9999".parse().unwrap();
        assert_eq!(client_ip(&request, addr), "192.168.1.7");
    }
}
