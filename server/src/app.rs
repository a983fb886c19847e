//! Core application

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::api::ApiServer;
use crate::core::banner;
use crate::core::cli::{self, CliConfig, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{
    APP_NAME_LOWER, CACHE_TTL_MODELS_SECS, CACHE_TTL_PROFILES_SECS, ENV_LOG,
};
use crate::core::shutdown::ShutdownService;
use crate::core::storage::AppStorage;
use crate::data::cache::{RateLimiter, TtlCache};
use crate::data::documents::DocumentStore;
use crate::data::sqlite::SqliteService;
use crate::domain::openrouter::OpenRouterClient;

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub storage: Arc<AppStorage>,
    pub db: Arc<SqliteService>,
    pub profiles_cache: Arc<TtlCache>,
    pub models_cache: Arc<TtlCache>,
    pub limiter: Arc<RateLimiter>,
    pub openrouter: Arc<OpenRouterClient>,
    pub documents: Arc<DocumentStore>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        match command {
            Some(Commands::Start) | None => {}
        }

        let app = Self::init(&cli_config).await?;
        Self::start_server(app).await
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let storage = Arc::new(AppStorage::init(&config).await?);

        let db = Arc::new(
            SqliteService::init(storage.db_path())
                .await
                .context("Failed to initialize database")?,
        );

        // Process-global caches and limiter, explicitly initialized here so
        // tests can construct and drop their own instances
        let profiles_cache = Arc::new(TtlCache::new(
            "profiles",
            Duration::from_secs(CACHE_TTL_PROFILES_SECS),
        ));
        let models_cache = Arc::new(TtlCache::new(
            "models",
            Duration::from_secs(CACHE_TTL_MODELS_SECS),
        ));
        let limiter = Arc::new(RateLimiter::new());

        let openrouter = Arc::new(
            OpenRouterClient::new(&config.openrouter)
                .context("Failed to initialize OpenRouter client")?,
        );
        if !openrouter.has_api_key() {
            tracing::warn!("OPENROUTER_API_KEY is not set; streaming requests will fail");
        }

        let documents = Arc::new(
            DocumentStore::init(storage.uploads_dir())
                .await
                .context("Failed to initialize document store")?,
        );

        Ok(Self {
            shutdown: ShutdownService::new(),
            config,
            storage,
            db,
            profiles_cache,
            models_cache,
            limiter,
            openrouter,
            documents,
        })
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self) -> Result<()> {
        app.shutdown.install_signal_handlers();

        app.shutdown
            .register(app.db.start_checkpoint_task(app.shutdown.subscribe()))
            .await;

        banner::print_banner(
            &app.config.server.host,
            app.config.server.port,
            &app.storage.data_dir().display().to_string(),
            app.openrouter.has_api_key(),
        );

        let server = ApiServer::new(app);
        let app = server.start().await?;

        app.shutdown.shutdown().await;
        app.db.close().await;

        Ok(())
    }
}
