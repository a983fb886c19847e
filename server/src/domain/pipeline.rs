//! Streaming pipeline
//!
//! One instance per in-flight request. Preflight resolves the session,
//! profile, and effective parameters into a `PreparedStream` or a typed
//! error; the run phase relays provider deltas as `token` frames and
//! persists the assistant message plus usage accounting only after the
//! upstream completes. Every failure path emits exactly one terminal frame;
//! a dropped generator (client disconnect) persists nothing and tears down
//! the upstream connection by dropping it.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use sqlx::SqlitePool;

use crate::api::error::ApiError;
use crate::core::constants::{
    DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, PRESET_PREFIX, STREAM_IDLE_TIMEOUT_SECS,
};
use crate::data::cache::TtlCache;
use crate::data::sqlite::StoreError;
use crate::data::sqlite::repositories::{message, model, profile, session, usage};
use crate::data::types::Role;
use crate::domain::openrouter::{
    ChatMessage, ChatRequest, OpenRouterClient, StreamEvent, UsageCounts, UsageOptions,
};
use crate::domain::sse::{SseEvent, SseFrame};

/// Stream request input, after HTTP-level validation
#[derive(Debug, Clone)]
pub struct StreamParams {
    pub session_id: String,
    pub model_id: String,
    /// Explicit profile wins over the session default; both absent means no
    /// profile is used
    pub profile_id: Option<i64>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
}

/// Everything the run phase needs, resolved by preflight
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedStream {
    pub session_id: String,
    /// Model id with any profile preset label composed in
    pub model_id: String,
    pub profile_id: Option<i64>,
    pub temperature: f64,
    pub max_tokens: i64,
    pub messages: Vec<ChatMessage>,
    /// Dollars per token; zero when the catalog has no price
    pub prompt_price: f64,
    pub completion_price: f64,
}

/// Preflight: admission checks and parameter resolution
pub async fn prepare(
    pool: &SqlitePool,
    profiles_cache: &TtlCache,
    has_api_key: bool,
    params: &StreamParams,
) -> Result<PreparedStream, ApiError> {
    if !has_api_key {
        return Err(ApiError::missing_api_key());
    }

    let session = session::get_session(pool, &params.session_id)
        .await?
        .ok_or_else(|| ApiError::session_not_found(&params.session_id))?;

    let profile_id = params.profile_id.or(session.profile_id);
    let profile = match profile_id {
        Some(id) => Some(
            profile::get_profile(pool, Some(profiles_cache), id)
                .await?
                .ok_or_else(|| ApiError::profile_not_found(id))?,
        ),
        None => None,
    };

    let temperature = params
        .temperature
        .or(profile.as_ref().map(|p| p.temperature))
        .unwrap_or(DEFAULT_TEMPERATURE);
    let max_tokens = params
        .max_tokens
        .or(profile.as_ref().map(|p| p.max_tokens))
        .unwrap_or(DEFAULT_MAX_TOKENS);

    let model_id = compose_model_id(
        &params.model_id,
        profile.as_ref().and_then(|p| p.preset.as_deref()),
    );

    let history = message::list_for_session(pool, &params.session_id).await?;
    let mut messages = Vec::with_capacity(history.len() + 1);

    // Synthetic system turn from the profile; never persisted
    if let Some(system_prompt) = profile
        .as_ref()
        .and_then(|p| p.system_prompt.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        messages.push(ChatMessage::new(Role::System, system_prompt));
    }
    messages.extend(
        history
            .into_iter()
            .map(|m| ChatMessage { role: m.role, content: m.content }),
    );

    // Pricing comes from the catalog row for the raw model id; an unknown
    // model streams fine, it just costs zero on the books
    let (prompt_price, completion_price) = match model::get_model(pool, &params.model_id).await? {
        Some(row) => (
            row.prompt_price.unwrap_or(0.0),
            row.completion_price.unwrap_or(0.0),
        ),
        None => (0.0, 0.0),
    };

    Ok(PreparedStream {
        session_id: params.session_id.clone(),
        model_id,
        profile_id,
        temperature,
        max_tokens,
        messages,
        prompt_price,
        completion_price,
    })
}

/// Compose the wire model id with a profile preset label. Already-prefixed
/// model ids and labels are never double-prefixed.
fn compose_model_id(model_id: &str, preset: Option<&str>) -> String {
    let Some(label) = preset.map(str::trim).filter(|l| !l.is_empty()) else {
        return model_id.to_string();
    };
    if model_id.contains(PRESET_PREFIX) {
        return model_id.to_string();
    }
    let label = label.strip_prefix(PRESET_PREFIX).unwrap_or(label);
    format!("{model_id}{PRESET_PREFIX}{label}")
}

/// Shared handles the run phase needs, owned so the generator is 'static
pub struct StreamContext {
    pub pool: SqlitePool,
    pub client: Arc<OpenRouterClient>,
    pub request_id: String,
}

/// Logs an abandoned stream. Disarmed right before the terminal frame is
/// yielded; if the generator is dropped earlier the client went away.
struct CancelGuard {
    request_id: String,
    armed: bool,
}

impl CancelGuard {
    fn new(request_id: String) -> Self {
        Self {
            request_id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if self.armed {
            tracing::info!(
                request_id = %self.request_id,
                "Stream cancelled before completion; upstream closed, nothing persisted"
            );
        }
    }
}

/// Run a prepared stream to completion, yielding encoded SSE frames
///
/// Frame order: one `start`, zero or more `token`s, exactly one terminal
/// (`done` or `error`).
pub fn run(
    ctx: StreamContext,
    prepared: PreparedStream,
) -> impl Stream<Item = Result<Bytes, Infallible>> {
    run_with_idle_timeout(ctx, prepared, Duration::from_secs(STREAM_IDLE_TIMEOUT_SECS))
}

fn run_with_idle_timeout(
    ctx: StreamContext,
    prepared: PreparedStream,
    idle_timeout: Duration,
) -> impl Stream<Item = Result<Bytes, Infallible>> {
    async_stream::stream! {
        let mut guard = CancelGuard::new(ctx.request_id.clone());

        yield Ok(frame(
            SseEvent::Start,
            serde_json::json!({
                "session_id": prepared.session_id,
                "model_id": prepared.model_id,
            }),
        ));

        let request = ChatRequest {
            model: prepared.model_id.clone(),
            messages: prepared.messages.clone(),
            temperature: Some(prepared.temperature),
            max_tokens: Some(prepared.max_tokens),
            stream: true,
            usage: UsageOptions { include: true },
        };

        let mut upstream = match ctx.client.chat_stream(&request).await {
            Ok(stream) => stream,
            Err(e) => {
                let err: ApiError = e.into();
                tracing::warn!(request_id = %ctx.request_id, code = err.code.as_str(), "Upstream open failed");
                guard.disarm();
                yield Ok(error_frame(&err, &ctx.request_id));
                return;
            }
        };

        let mut assistant = String::new();
        let mut usage_seen: Option<UsageCounts> = None;

        loop {
            match tokio::time::timeout(idle_timeout, upstream.next_event()).await {
                Err(_) => {
                    tracing::warn!(request_id = %ctx.request_id, "Upstream read exceeded inactivity budget");
                    let err = ApiError::stream_error("Upstream stream timed out");
                    guard.disarm();
                    yield Ok(error_frame(&err, &ctx.request_id));
                    return;
                }
                Ok(None) | Ok(Some(Ok(StreamEvent::Done))) => break,
                Ok(Some(Ok(StreamEvent::Delta { text, usage }))) => {
                    if let Some(usage) = usage {
                        // Counts may be refined during the stream; keep the latest
                        usage_seen = Some(usage);
                    }
                    if !text.is_empty() {
                        assistant.push_str(&text);
                        yield Ok(frame(SseEvent::Token, serde_json::json!({ "token": text })));
                    }
                }
                Ok(Some(Err(e))) => {
                    let err: ApiError = e.into();
                    tracing::warn!(request_id = %ctx.request_id, code = err.code.as_str(), "Upstream stream failed");
                    guard.disarm();
                    yield Ok(error_frame(&err, &ctx.request_id));
                    return;
                }
            }
        }

        match persist_completion(&ctx.pool, &prepared, &assistant, usage_seen).await {
            Ok(()) => {
                let usage_json = match usage_seen {
                    Some(usage) => serde_json::json!(usage),
                    None => serde_json::Value::Null,
                };
                guard.disarm();
                yield Ok(frame(
                    SseEvent::Done,
                    serde_json::json!({ "assistant": assistant, "usage": usage_json }),
                ));
            }
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id, error = %e, "Failed to persist completed stream");
                let err = ApiError::stream_error("Failed to persist completion");
                guard.disarm();
                yield Ok(error_frame(&err, &ctx.request_id));
            }
        }
    }
}

fn frame(event: SseEvent, data: serde_json::Value) -> Bytes {
    Bytes::from(SseFrame::new(event, data).encode())
}

fn error_frame(err: &ApiError, request_id: &str) -> Bytes {
    frame(SseEvent::Error, err.sse_payload(request_id))
}

/// Persist the assistant message and, when counters were observed, the
/// usage row. Called only after a clean upstream completion.
async fn persist_completion(
    pool: &SqlitePool,
    prepared: &PreparedStream,
    assistant: &str,
    usage_seen: Option<UsageCounts>,
) -> Result<(), StoreError> {
    message::append_message(pool, &prepared.session_id, Role::Assistant, assistant).await?;

    if let Some(counts) = usage_seen {
        let cost = compute_cost(&counts, prepared.prompt_price, prepared.completion_price);
        usage::append_usage(
            pool,
            usage::NewUsage {
                session_id: prepared.session_id.clone(),
                profile_id: prepared.profile_id,
                model_id: prepared.model_id.clone(),
                prompt_tokens: counts.prompt_tokens.max(0),
                completion_tokens: counts.completion_tokens.max(0),
                cost_usd: cost,
            },
        )
        .await?;
    }

    Ok(())
}

/// Cost in dollars: `tokens × unit_price` per side, zero for unknown prices
fn compute_cost(counts: &UsageCounts, prompt_price: f64, completion_price: f64) -> f64 {
    let cost = counts.prompt_tokens.max(0) as f64 * prompt_price
        + counts.completion_tokens.max(0) as f64 * completion_price;
    cost.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    use crate::data::sqlite::repositories::model::sync_catalog;
    use crate::data::sqlite::repositories::profile::{NewProfile, create_profile};
    use crate::data::sqlite::repositories::session::{NewSession, create_session};
    use crate::data::sqlite::repositories::testutil::test_pool;
    use crate::data::types::{ModelRow, SessionType};

    fn profiles_cache() -> TtlCache {
        TtlCache::new("profiles", Duration::from_secs(60))
    }

    fn params(session_id: &str) -> StreamParams {
        StreamParams {
            session_id: session_id.to_string(),
            model_id: "acme/small".to_string(),
            profile_id: None,
            temperature: None,
            max_tokens: None,
        }
    }

    async fn make_session(pool: &SqlitePool, profile_id: Option<i64>) -> String {
        create_session(
            pool,
            NewSession {
                session_type: SessionType::Chat,
                title: None,
                profile_id,
            },
        )
        .await
        .unwrap()
        .id
    }

    async fn make_profile(pool: &SqlitePool, system_prompt: Option<&str>) -> i64 {
        create_profile(
            pool,
            None,
            NewProfile {
                name: "helper".to_string(),
                system_prompt: system_prompt.map(str::to_string),
                temperature: Some(0.5),
                max_tokens: Some(1024),
                preset: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_preflight_requires_api_key() {
        let pool = test_pool().await;
        let cache = profiles_cache();

        let err = prepare(&pool, &cache, false, &params("s1")).await.unwrap_err();
        assert_eq!(err.code.as_str(), "MISSING_API_KEY");
    }

    #[tokio::test]
    async fn test_preflight_unknown_session() {
        let pool = test_pool().await;
        let cache = profiles_cache();

        let err = prepare(&pool, &cache, true, &params("missing")).await.unwrap_err();
        assert_eq!(err.code.as_str(), "SESSION_NOT_FOUND");
        assert_eq!(err.resource_id.as_deref(), Some("missing"));
    }

    #[tokio::test]
    async fn test_preflight_unknown_profile() {
        let pool = test_pool().await;
        let cache = profiles_cache();
        let sid = make_session(&pool, None).await;

        let mut p = params(&sid);
        p.profile_id = Some(404);
        let err = prepare(&pool, &cache, true, &p).await.unwrap_err();
        assert_eq!(err.code.as_str(), "PROFILE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_defaults_without_profile() {
        let pool = test_pool().await;
        let cache = profiles_cache();
        let sid = make_session(&pool, None).await;

        let prepared = prepare(&pool, &cache, true, &params(&sid)).await.unwrap();
        assert_eq!(prepared.temperature, 0.7);
        assert_eq!(prepared.max_tokens, 2048);
        assert!(prepared.messages.is_empty());
        assert_eq!(prepared.profile_id, None);
    }

    #[tokio::test]
    async fn test_profile_values_and_overrides() {
        let pool = test_pool().await;
        let cache = profiles_cache();
        let profile_id = make_profile(&pool, Some("You are helpful.")).await;
        let sid = make_session(&pool, Some(profile_id)).await;

        // Profile values apply when the request has no overrides
        let prepared = prepare(&pool, &cache, true, &params(&sid)).await.unwrap();
        assert_eq!(prepared.temperature, 0.5);
        assert_eq!(prepared.max_tokens, 1024);
        assert_eq!(prepared.profile_id, Some(profile_id));

        // Explicit overrides win over profile values
        let mut p = params(&sid);
        p.temperature = Some(1.3);
        p.max_tokens = Some(64);
        let prepared = prepare(&pool, &cache, true, &p).await.unwrap();
        assert_eq!(prepared.temperature, 1.3);
        assert_eq!(prepared.max_tokens, 64);
    }

    #[tokio::test]
    async fn test_explicit_profile_wins_over_session_default() {
        let pool = test_pool().await;
        let cache = profiles_cache();
        let default_profile = make_profile(&pool, None).await;
        let explicit_profile = create_profile(
            &pool,
            None,
            NewProfile {
                name: "explicit".to_string(),
                system_prompt: None,
                temperature: Some(1.9),
                max_tokens: None,
                preset: None,
            },
        )
        .await
        .unwrap()
        .id;
        let sid = make_session(&pool, Some(default_profile)).await;

        let mut p = params(&sid);
        p.profile_id = Some(explicit_profile);
        let prepared = prepare(&pool, &cache, true, &p).await.unwrap();
        assert_eq!(prepared.profile_id, Some(explicit_profile));
        assert_eq!(prepared.temperature, 1.9);
    }

    #[tokio::test]
    async fn test_system_prompt_prepended_not_persisted() {
        let pool = test_pool().await;
        let cache = profiles_cache();
        let profile_id = make_profile(&pool, Some("You are helpful.")).await;
        let sid = make_session(&pool, Some(profile_id)).await;
        message::append_message(&pool, &sid, Role::User, "hi").await.unwrap();

        let prepared = prepare(&pool, &cache, true, &params(&sid)).await.unwrap();
        assert_eq!(prepared.messages.len(), 2);
        assert_eq!(prepared.messages[0].role, Role::System);
        assert_eq!(prepared.messages[0].content, "You are helpful.");
        assert_eq!(prepared.messages[1].role, Role::User);

        // The synthetic system turn never reaches the store
        let stored = message::list_for_session(&pool, &sid).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_empty_system_prompt_yields_only_user_turn() {
        let pool = test_pool().await;
        let cache = profiles_cache();
        let profile_id = make_profile(&pool, Some("   ")).await;
        let sid = make_session(&pool, Some(profile_id)).await;
        message::append_message(&pool, &sid, Role::User, "hi").await.unwrap();

        let prepared = prepare(&pool, &cache, true, &params(&sid)).await.unwrap();
        assert_eq!(prepared.messages.len(), 1);
        assert_eq!(prepared.messages[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_pricing_resolved_from_catalog() {
        let pool = test_pool().await;
        let cache = profiles_cache();
        let sid = make_session(&pool, None).await;
        sync_catalog(
            &pool,
            None,
            &[ModelRow {
                id: "acme/small".to_string(),
                name: "Acme Small".to_string(),
                context_length: 8192,
                prompt_price: Some(1e-6),
                completion_price: Some(2e-6),
                supports_reasoning: false,
                created_at: 0,
            }],
        )
        .await
        .unwrap();

        let prepared = prepare(&pool, &cache, true, &params(&sid)).await.unwrap();
        assert_eq!(prepared.prompt_price, 1e-6);
        assert_eq!(prepared.completion_price, 2e-6);
    }

    #[tokio::test]
    async fn test_unknown_model_prices_are_zero() {
        let pool = test_pool().await;
        let cache = profiles_cache();
        let sid = make_session(&pool, None).await;

        let prepared = prepare(&pool, &cache, true, &params(&sid)).await.unwrap();
        assert_eq!(prepared.prompt_price, 0.0);
        assert_eq!(prepared.completion_price, 0.0);
    }

    #[test]
    fn test_compose_model_id() {
        assert_eq!(compose_model_id("acme/small", None), "acme/small");
        assert_eq!(
            compose_model_id("acme/small", Some("coding")),
            "acme/small@preset/coding"
        );
        // A label already carrying the wire prefix is not double-prefixed
        assert_eq!(
            compose_model_id("acme/small", Some("@preset/coding")),
            "acme/small@preset/coding"
        );
        // A model id already carrying a preset is left alone
        assert_eq!(
            compose_model_id("acme/small@preset/coding", Some("other")),
            "acme/small@preset/coding"
        );
        assert_eq!(compose_model_id("acme/small", Some("  ")), "acme/small");
    }

    #[test]
    fn test_compute_cost() {
        let counts = UsageCounts {
            prompt_tokens: 3,
            completion_tokens: 2,
            total_tokens: 5,
        };
        let cost = compute_cost(&counts, 1e-6, 2e-6);
        assert!((cost - 7e-6).abs() < 1e-15);

        // Unknown prices zero out the corresponding factor
        assert_eq!(compute_cost(&counts, 0.0, 0.0), 0.0);
    }

    #[tokio::test]
    async fn test_persist_completion_writes_message_and_usage() {
        let pool = test_pool().await;
        let sid = make_session(&pool, None).await;
        let prepared = PreparedStream {
            session_id: sid.clone(),
            model_id: "acme/small".to_string(),
            profile_id: None,
            temperature: 0.7,
            max_tokens: 2048,
            messages: vec![],
            prompt_price: 1e-6,
            completion_price: 2e-6,
        };

        persist_completion(
            &pool,
            &prepared,
            "Hi",
            Some(UsageCounts {
                prompt_tokens: 3,
                completion_tokens: 2,
                total_tokens: 5,
            }),
        )
        .await
        .unwrap();

        let messages = message::list_for_session(&pool, &sid).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::Assistant);
        assert_eq!(messages[0].content, "Hi");

        let (rows, total) = usage::list_usage(&pool, 1, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].total_tokens, 5);
        assert!((rows[0].cost_usd - 7e-6).abs() < 1e-15);
        assert_eq!(rows[0].model_id, "acme/small");
    }

    #[tokio::test]
    async fn test_persist_completion_without_usage_writes_no_usage_row() {
        let pool = test_pool().await;
        let sid = make_session(&pool, None).await;
        let prepared = PreparedStream {
            session_id: sid.clone(),
            model_id: "acme/small".to_string(),
            profile_id: None,
            temperature: 0.7,
            max_tokens: 2048,
            messages: vec![],
            prompt_price: 0.0,
            completion_price: 0.0,
        };

        persist_completion(&pool, &prepared, "Hi", None).await.unwrap();

        let (_, total) = usage::list_usage(&pool, 1, 10).await.unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_run_emits_error_frame_when_upstream_unreachable() {
        use crate::core::config::OpenRouterConfig;

        let pool = test_pool().await;
        let sid = make_session(&pool, None).await;
        let client = OpenRouterClient::new(&OpenRouterConfig {
            api_key: Some("sk-test".to_string()),
            // Nothing listens on port 1; connect is refused immediately
            base_url: "http://127.0.0.1:1/api/v1".to_string(),
            http_referer: "http://localhost".to_string(),
            x_title: "test".to_string(),
        })
        .unwrap();

        let prepared = PreparedStream {
            session_id: sid.clone(),
            model_id: "acme/small".to_string(),
            profile_id: None,
            temperature: 0.7,
            max_tokens: 16,
            messages: vec![ChatMessage::new(Role::User, "hi")],
            prompt_price: 0.0,
            completion_price: 0.0,
        };

        let ctx = StreamContext {
            pool: pool.clone(),
            client: Arc::new(client),
            request_id: "req_test".to_string(),
        };

        let frames: Vec<Bytes> = run(ctx, prepared)
            .map(|r| r.unwrap())
            .collect::<Vec<_>>()
            .await;
        let body: String = frames
            .iter()
            .map(|b| String::from_utf8_lossy(b).to_string())
            .collect();

        let decoded = crate::domain::sse::SseFrame::decode_all(&body);
        assert_eq!(decoded.first().unwrap().event, SseEvent::Start);
        let last = decoded.last().unwrap();
        assert_eq!(last.event, SseEvent::Error);
        assert_eq!(last.data["error_code"], "OPENROUTER_ERROR");
        assert_eq!(last.data["request_id"], "req_test");

        // Failure path persists nothing
        let messages = message::list_for_session(&pool, &sid).await.unwrap();
        assert!(messages.is_empty());
    }
}
