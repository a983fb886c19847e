//! HTTP surface

pub mod error;
pub mod middleware;
pub mod rate_limit;
pub mod routes;
pub mod server;
pub mod types;

use std::sync::Arc;

use sqlx::SqlitePool;

pub use error::{ApiError, ErrorCode};
pub use middleware::RequestId;
pub use server::ApiServer;

use crate::core::config::AppConfig;
use crate::core::storage::AppStorage;
use crate::data::cache::TtlCache;
use crate::data::documents::DocumentStore;
use crate::data::sqlite::SqliteService;
use crate::domain::openrouter::OpenRouterClient;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<SqliteService>,
    pub storage: Arc<AppStorage>,
    pub profiles_cache: Arc<TtlCache>,
    pub models_cache: Arc<TtlCache>,
    pub openrouter: Arc<OpenRouterClient>,
    pub documents: Arc<DocumentStore>,
}

impl AppState {
    pub fn pool(&self) -> &SqlitePool {
        self.db.pool()
    }
}
