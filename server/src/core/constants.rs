// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display)
pub const APP_NAME: &str = "ChatRelay";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "chatrelay";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".chatrelay";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "CHATRELAY_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "CHATRELAY_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "CHATRELAY_LOG";

/// Environment variable to override the data directory
pub const ENV_DATA_DIR: &str = "CHATRELAY_DATA_DIR";

// =============================================================================
// Environment Variables - Gateway Options
// =============================================================================

/// Upstream provider API key (required for streaming)
pub const ENV_OPENROUTER_API_KEY: &str = "OPENROUTER_API_KEY";

/// Upstream provider base URL
pub const ENV_OPENROUTER_BASE_URL: &str = "OPENROUTER_BASE_URL";

/// Referer header sent to the provider
pub const ENV_OPENROUTER_HTTP_REFERER: &str = "OPENROUTER_HTTP_REFERER";

/// Title header sent to the provider
pub const ENV_OPENROUTER_X_TITLE: &str = "OPENROUTER_X_TITLE";

/// Comma-separated allowed CORS origins
pub const ENV_APP_ORIGINS: &str = "APP_ORIGINS";

/// Database file path override
pub const ENV_DB_PATH: &str = "DB_PATH";

/// Uploads root override
pub const ENV_UPLOADS_DIR: &str = "UPLOADS_DIR";

/// Master switch for rate limiting
pub const ENV_RATE_LIMIT_ENABLED: &str = "RATE_LIMIT_ENABLED";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 8787;

/// Default body size limit (bytes)
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Body size limit for document uploads (bytes)
pub const UPLOAD_BODY_LIMIT: usize = 32 * 1024 * 1024;

/// Request id header name
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Maximum accepted length for a caller-supplied request id
pub const REQUEST_ID_MAX_LEN: usize = 64;

// =============================================================================
// Upstream Defaults
// =============================================================================

/// Default provider base URL
pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default referer header value
pub const DEFAULT_HTTP_REFERER: &str = "http://localhost:8787";

/// Default title header value
pub const DEFAULT_X_TITLE: &str = "ChatRelay";

/// Connect timeout for upstream requests (seconds). There is deliberately no
/// overall request timeout: completion streams may legitimately run for
/// minutes. Inactivity is bounded per read by `STREAM_IDLE_TIMEOUT_SECS`.
pub const UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Per-read inactivity budget for an open completion stream (seconds)
pub const STREAM_IDLE_TIMEOUT_SECS: u64 = 300;

/// Wire prefix selecting a provider-side parameter bundle
pub const PRESET_PREFIX: &str = "@preset/";

// =============================================================================
// Generation Defaults
// =============================================================================

/// Sampling temperature used when neither the request nor a profile sets one
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Completion token cap used when neither the request nor a profile sets one
pub const DEFAULT_MAX_TOKENS: i64 = 2048;

// =============================================================================
// SQLite
// =============================================================================

/// Database file name inside the data directory
pub const SQLITE_DB_FILENAME: &str = "chatrelay.db";

/// Maximum pooled connections
pub const SQLITE_MAX_CONNECTIONS: u32 = 5;

/// Busy timeout in seconds
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 5;

/// Page cache size pragma value (negative = KiB)
pub const SQLITE_CACHE_SIZE: &str = "-64000";

/// WAL autocheckpoint pragma value (pages)
pub const SQLITE_WAL_AUTOCHECKPOINT: &str = "1000";

/// Interval between background WAL checkpoints (seconds)
pub const SQLITE_CHECKPOINT_INTERVAL_SECS: u64 = 300;

// =============================================================================
// Cache
// =============================================================================

/// Version prefix for all cache keys
pub const CACHE_KEY_VERSION: &str = "v1";

/// TTL for the profiles cache (seconds). Profiles are read on every stream.
pub const CACHE_TTL_PROFILES_SECS: u64 = 60;

/// TTL for the models cache (seconds). The catalog is read-mostly and
/// refreshed by an explicit sync.
pub const CACHE_TTL_MODELS_SECS: u64 = 300;

/// Maximum entries per cache instance
pub const CACHE_MAX_ENTRIES: u64 = 10_000;

// =============================================================================
// Rate Limiting
// =============================================================================

/// Default policy strings per endpoint, overridable via `RATE_LIMIT_<ENDPOINT>`
pub const DEFAULT_RATE_LIMIT_STREAM: &str = "10 per minute";
pub const DEFAULT_RATE_LIMIT_MODEL_SYNC: &str = "5 per hour";
pub const DEFAULT_RATE_LIMIT_UPLOAD: &str = "20 per minute";
pub const DEFAULT_RATE_LIMIT_SESSIONS: &str = "60 per minute";
pub const DEFAULT_RATE_LIMIT_MESSAGES: &str = "120 per minute";
pub const DEFAULT_RATE_LIMIT_PROFILES: &str = "60 per minute";
pub const DEFAULT_RATE_LIMIT_MODELS_LIST: &str = "60 per minute";
pub const DEFAULT_RATE_LIMIT_USAGE_LOGS: &str = "60 per minute";
pub const DEFAULT_RATE_LIMIT_HEALTH_CHECK: &str = "120 per minute";

// =============================================================================
// Search
// =============================================================================

/// Hard cap on search result page size
pub const SEARCH_MAX_LIMIT: u32 = 200;

/// Default search result page size
pub const SEARCH_DEFAULT_LIMIT: u32 = 50;

/// Token budget for FTS snippets
pub const SEARCH_SNIPPET_TOKENS: i32 = 12;

// =============================================================================
// Shutdown
// =============================================================================

/// Grace period for background tasks during shutdown (seconds)
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 10;
