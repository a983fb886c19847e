//! Application configuration
//!
//! Configuration is environment-first: every recognized option has an
//! environment variable, CLI flags override a handful of them, and defaults
//! come from `core::constants`. The provider API key is the only secret and
//! never leaves the server process.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};

use super::cli::CliConfig;
use super::constants::{
    DEFAULT_HOST, DEFAULT_HTTP_REFERER, DEFAULT_OPENROUTER_BASE_URL, DEFAULT_PORT,
    DEFAULT_RATE_LIMIT_HEALTH_CHECK, DEFAULT_RATE_LIMIT_MESSAGES, DEFAULT_RATE_LIMIT_MODELS_LIST,
    DEFAULT_RATE_LIMIT_MODEL_SYNC, DEFAULT_RATE_LIMIT_PROFILES, DEFAULT_RATE_LIMIT_SESSIONS,
    DEFAULT_RATE_LIMIT_STREAM, DEFAULT_RATE_LIMIT_UPLOAD, DEFAULT_RATE_LIMIT_USAGE_LOGS,
    DEFAULT_X_TITLE, ENV_APP_ORIGINS, ENV_DB_PATH, ENV_OPENROUTER_API_KEY,
    ENV_OPENROUTER_BASE_URL, ENV_OPENROUTER_HTTP_REFERER, ENV_OPENROUTER_X_TITLE,
    ENV_RATE_LIMIT_ENABLED, ENV_UPLOADS_DIR,
};

/// HTTP listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Upstream provider configuration
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    /// Provider API key. Held server-side only; absence is surfaced to
    /// clients as a typed error, not a startup failure.
    pub api_key: Option<String>,
    pub base_url: String,
    pub http_referer: String,
    pub x_title: String,
}

/// A fixed-window rate limit policy parsed from a `"<N> per <unit>"` string
#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window_secs: u64,
    /// The original policy string, echoed in `X-RateLimit-Limit`
    pub raw: String,
}

impl FromStr for RateLimitPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let (Some(count), Some("per"), Some(unit), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            bail!("invalid rate limit policy {s:?}, expected \"<N> per <unit>\"");
        };

        let limit: u32 = count
            .parse()
            .with_context(|| format!("invalid rate limit count in policy {s:?}"))?;
        if limit == 0 {
            bail!("rate limit count must be positive in policy {s:?}");
        }

        let window_secs = match unit {
            "second" => 1,
            "minute" => 60,
            "hour" => 3600,
            "day" => 86400,
            other => bail!("unknown rate limit unit {other:?} in policy {s:?}"),
        };

        Ok(Self {
            limit,
            window_secs,
            raw: s.to_string(),
        })
    }
}

/// Per-endpoint rate limit policies
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub stream: RateLimitPolicy,
    pub model_sync: RateLimitPolicy,
    pub upload: RateLimitPolicy,
    pub sessions: RateLimitPolicy,
    pub messages: RateLimitPolicy,
    pub profiles: RateLimitPolicy,
    pub models_list: RateLimitPolicy,
    pub usage_logs: RateLimitPolicy,
    pub health_check: RateLimitPolicy,
}

/// Top-level application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub openrouter: OpenRouterConfig,
    /// Database file override (`DB_PATH`)
    pub db_path: Option<PathBuf>,
    /// Uploads root override (`UPLOADS_DIR`)
    pub uploads_dir: Option<PathBuf>,
    /// Allowed CORS origins (`APP_ORIGINS`); empty means localhost defaults
    pub cors_origins: Vec<String>,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    /// Load configuration from the environment, with CLI overrides on top
    pub fn load(cli: &CliConfig) -> Result<Self> {
        let server = ServerConfig {
            host: cli.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.unwrap_or(DEFAULT_PORT),
        };

        let openrouter = OpenRouterConfig {
            api_key: env_nonempty(ENV_OPENROUTER_API_KEY),
            base_url: env_nonempty(ENV_OPENROUTER_BASE_URL)
                .unwrap_or_else(|| DEFAULT_OPENROUTER_BASE_URL.to_string()),
            http_referer: env_nonempty(ENV_OPENROUTER_HTTP_REFERER)
                .unwrap_or_else(|| DEFAULT_HTTP_REFERER.to_string()),
            x_title: env_nonempty(ENV_OPENROUTER_X_TITLE)
                .unwrap_or_else(|| DEFAULT_X_TITLE.to_string()),
        };

        let db_path = cli
            .db_path
            .clone()
            .or_else(|| env_nonempty(ENV_DB_PATH).map(PathBuf::from));
        let uploads_dir = cli
            .uploads_dir
            .clone()
            .or_else(|| env_nonempty(ENV_UPLOADS_DIR).map(PathBuf::from));

        let cors_origins = env_nonempty(ENV_APP_ORIGINS)
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            server,
            openrouter,
            db_path,
            uploads_dir,
            cors_origins,
            rate_limit: Self::load_rate_limits()?,
        })
    }

    fn load_rate_limits() -> Result<RateLimitConfig> {
        let enabled = env_nonempty(ENV_RATE_LIMIT_ENABLED)
            .map(|v| parse_bool(&v))
            .transpose()?
            .unwrap_or(true);

        Ok(RateLimitConfig {
            enabled,
            stream: policy("RATE_LIMIT_STREAM", DEFAULT_RATE_LIMIT_STREAM)?,
            model_sync: policy("RATE_LIMIT_MODEL_SYNC", DEFAULT_RATE_LIMIT_MODEL_SYNC)?,
            upload: policy("RATE_LIMIT_UPLOAD", DEFAULT_RATE_LIMIT_UPLOAD)?,
            sessions: policy("RATE_LIMIT_SESSIONS", DEFAULT_RATE_LIMIT_SESSIONS)?,
            messages: policy("RATE_LIMIT_MESSAGES", DEFAULT_RATE_LIMIT_MESSAGES)?,
            profiles: policy("RATE_LIMIT_PROFILES", DEFAULT_RATE_LIMIT_PROFILES)?,
            models_list: policy("RATE_LIMIT_MODELS_LIST", DEFAULT_RATE_LIMIT_MODELS_LIST)?,
            usage_logs: policy("RATE_LIMIT_USAGE_LOGS", DEFAULT_RATE_LIMIT_USAGE_LOGS)?,
            health_check: policy("RATE_LIMIT_HEALTH_CHECK", DEFAULT_RATE_LIMIT_HEALTH_CHECK)?,
        })
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn policy(env_name: &str, default: &str) -> Result<RateLimitPolicy> {
    match env_nonempty(env_name) {
        Some(v) => v
            .parse()
            .with_context(|| format!("invalid {env_name} value")),
        None => default.parse(),
    }
}

fn parse_bool(v: &str) -> Result<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got {other:?}"),
    }
}
