//! API server initialization

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::AppState;
use super::middleware::{self, AllowedOrigins};
use super::rate_limit::{RateLimitState, rate_limit_middleware};
use super::routes::{
    backups, documents, health, messages, models, profiles, sessions, stream, usage,
};
use crate::core::CoreApp;
use crate::core::config::RateLimitPolicy;
use crate::core::constants::{DEFAULT_BODY_LIMIT, UPLOAD_BODY_LIMIT};
use crate::data::cache::RateLimiter;

pub struct ApiServer {
    app: CoreApp,
    allowed_origins: AllowedOrigins,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        let allowed_origins = AllowedOrigins::new(
            &app.config.cors_origins,
            &app.config.server.host,
            app.config.server.port,
        );
        Self {
            app,
            allowed_origins,
        }
    }

    /// Serve until shutdown; returns the CoreApp for teardown
    pub async fn start(self) -> Result<CoreApp> {
        let Self {
            app,
            allowed_origins,
        } = self;

        let state = AppState {
            config: Arc::new(app.config.clone()),
            db: app.db.clone(),
            storage: app.storage.clone(),
            profiles_cache: app.profiles_cache.clone(),
            models_cache: app.models_cache.clone(),
            openrouter: app.openrouter.clone(),
            documents: app.documents.clone(),
        };

        let router = build_router(state, &app.config.rate_limit, app.limiter.clone())
            .layer(TraceLayer::new_for_http())
            .layer(middleware::cors(&allowed_origins))
            // Outermost so every response, including 429s, carries the id
            .layer(axum::middleware::from_fn(middleware::request_id_middleware));

        let addr = SocketAddr::new(app.config.server.host.parse()?, app.config.server.port);
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "HTTP server listening");

        let shutdown = app.shutdown.clone();
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await?;

        Ok(app)
    }
}

fn build_router(
    state: AppState,
    rate_limit: &crate::core::config::RateLimitConfig,
    limiter: Arc<RateLimiter>,
) -> Router {
    let enabled = rate_limit.enabled;
    let limited = |router: Router<AppState>, policy: &RateLimitPolicy, endpoint: &'static str| {
        if enabled {
            router.layer(axum::middleware::from_fn_with_state(
                RateLimitState {
                    limiter: limiter.clone(),
                    policy: policy.clone(),
                    endpoint,
                },
                rate_limit_middleware,
            ))
        } else {
            router
        }
    };

    let health_routes = limited(
        Router::new().route("/api/health", get(health::health)),
        &rate_limit.health_check,
        "health",
    );

    let models_list_routes = limited(
        Router::new().route("/api/models", get(models::list_models)),
        &rate_limit.models_list,
        "models_list",
    );

    let model_sync_routes = limited(
        Router::new().route("/api/models/sync", post(models::sync_models)),
        &rate_limit.model_sync,
        "model_sync",
    );

    let profiles_routes = limited(
        Router::new()
            .route(
                "/api/profiles",
                post(profiles::create_profile).get(profiles::list_profiles),
            )
            .route(
                "/api/profiles/{id}",
                get(profiles::get_profile)
                    .put(profiles::update_profile)
                    .delete(profiles::delete_profile),
            ),
        &rate_limit.profiles,
        "profiles",
    );

    let sessions_routes = limited(
        Router::new()
            .route(
                "/api/sessions",
                post(sessions::create_session).get(sessions::list_sessions),
            )
            .route(
                "/api/sessions/{id}",
                get(sessions::get_session)
                    .patch(sessions::update_session)
                    .delete(sessions::delete_session),
            ),
        &rate_limit.sessions,
        "sessions",
    );

    let messages_routes = limited(
        Router::new()
            .route(
                "/api/sessions/{id}/messages",
                post(messages::create_message).get(messages::list_messages),
            )
            .route("/api/messages/search", get(messages::search_messages))
            .route(
                "/api/messages/{id}",
                get(messages::get_message).delete(messages::delete_message),
            ),
        &rate_limit.messages,
        "messages",
    );

    let documents_routes = limited(
        Router::new()
            .route(
                "/api/documents",
                post(documents::upload_document).get(documents::list_documents),
            )
            .route(
                "/api/documents/{filename}",
                get(documents::get_document).delete(documents::delete_document),
            )
            .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        &rate_limit.upload,
        "upload",
    );

    let usage_routes = limited(
        Router::new()
            .route("/api/usage", get(usage::list_usage))
            .route("/api/usage/summary", get(usage::usage_summary))
            .route("/api/usage/stats", get(usage::usage_stats))
            .route("/api/usage/models", get(usage::usage_by_model))
            .route("/api/usage/{id}", get(usage::get_usage)),
        &rate_limit.usage_logs,
        "usage_logs",
    );

    let backups_routes = Router::new().route(
        "/api/backups",
        post(backups::create_backup).get(backups::list_backups),
    );

    let stream_routes = limited(
        Router::new().route("/api/stream", get(stream::stream)),
        &rate_limit.stream,
        "stream",
    );

    Router::new()
        .merge(health_routes)
        .merge(models_list_routes)
        .merge(model_sync_routes)
        .merge(profiles_routes)
        .merge(sessions_routes)
        .merge(messages_routes)
        .merge(documents_routes)
        .merge(usage_routes)
        .merge(backups_routes)
        .merge(stream_routes)
        .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT))
        .with_state(state)
}
