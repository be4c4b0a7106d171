/*
 * Responsibility
 * - Load environment variables (and `.env`) into a typed `Config`
 * - Validate values up front: missing or malformed settings fail startup,
 *   never individual requests
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::services::analysis::UploadPolicy;

pub const DEFAULT_VISION_PROMPT: &str =
    "Describe this image in detail, including objects, colors, mood, and any notable features.";

const DEFAULT_ALLOWED_EXTENSIONS: &str = ".jpg,.jpeg,.png,.webp";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Settings for the upstream vision model (OpenAI-compatible chat completions).
pub struct VisionConfig {
    pub api_key: String,
    pub base_url: Url,
    pub model: String,
    pub prompt: String,
    pub timeout: Duration,
}

impl fmt::Debug for VisionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print the API key
        f.debug_struct("VisionConfig")
            .field("base_url", &self.base_url.as_str())
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug)]
pub struct Config {
    pub addr: SocketAddr,

    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,
    pub request_timeout: Duration,

    pub jwks_url: Url,
    pub jwks_cache_ttl: Duration,
    pub jwks_refresh_cooldown: Duration,
    pub token_leeway_seconds: u64,

    pub free_tier_limit: u64,
    pub upload_policy: UploadPolicy,

    pub vision: VisionConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// `from_env` is a thin wrapper around this; tests feed a map instead of
    /// touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Treat blank values the same as unset ones.
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port: u16 = parse_or(get("PORT"), "PORT", 3000)?;
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(get("APP_ENV"));

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let request_timeout = Duration::from_secs(parse_or(
            get("REQUEST_TIMEOUT_SECONDS"),
            "REQUEST_TIMEOUT_SECONDS",
            60,
        )?);

        let jwks_url = get("CLERK_JWKS_URL").ok_or(ConfigError::Missing("CLERK_JWKS_URL"))?;
        let jwks_url = parse_http_url(&jwks_url).ok_or(ConfigError::Invalid("CLERK_JWKS_URL"))?;

        let jwks_cache_ttl = Duration::from_secs(parse_or(
            get("JWKS_CACHE_TTL_SECONDS"),
            "JWKS_CACHE_TTL_SECONDS",
            300,
        )?);
        let jwks_refresh_cooldown = Duration::from_secs(parse_or(
            get("JWKS_REFRESH_COOLDOWN_SECONDS"),
            "JWKS_REFRESH_COOLDOWN_SECONDS",
            10,
        )?);
        let token_leeway_seconds =
            parse_or(get("TOKEN_LEEWAY_SECONDS"), "TOKEN_LEEWAY_SECONDS", 0)?;

        let free_tier_limit = parse_or(get("FREE_TIER_LIMIT"), "FREE_TIER_LIMIT", 1)?;

        let max_upload_bytes = parse_or(
            get("MAX_UPLOAD_BYTES"),
            "MAX_UPLOAD_BYTES",
            DEFAULT_MAX_UPLOAD_BYTES,
        )?;
        if max_upload_bytes == 0 {
            return Err(ConfigError::Invalid("MAX_UPLOAD_BYTES"));
        }

        let allowed_extensions = get("ALLOWED_EXTENSIONS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_EXTENSIONS.to_string());
        let allowed_extensions = allowed_extensions
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();
        let upload_policy = UploadPolicy::new(&allowed_extensions, max_upload_bytes)
            .map_err(|_| ConfigError::Invalid("ALLOWED_EXTENSIONS"))?;

        let vision = VisionConfig {
            api_key: get("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?,
            base_url: parse_http_url(
                &get("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            )
            .ok_or(ConfigError::Invalid("OPENAI_BASE_URL"))?,
            model: get("VISION_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            prompt: get("VISION_PROMPT").unwrap_or_else(|| DEFAULT_VISION_PROMPT.to_string()),
            timeout: Duration::from_secs(parse_or(
                get("VISION_TIMEOUT_SECONDS"),
                "VISION_TIMEOUT_SECONDS",
                45,
            )?),
        };

        Ok(Self {
            addr,
            app_env,
            cors_allowed_origins,
            request_timeout,
            jwks_url,
            jwks_cache_ttl,
            jwks_refresh_cooldown,
            token_leeway_seconds,
            free_tier_limit,
            upload_policy,
            vision,
        })
    }

    /// Upper bound for a whole request body.
    ///
    /// Leaves headroom above `max_upload_bytes` so an oversized file is still
    /// read far enough to be rejected with a descriptive 413 by the handler.
    pub fn max_body_bytes(&self) -> usize {
        self.upload_policy
            .max_bytes()
            .saturating_mul(2)
            .saturating_add(64 * 1024)
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn parse_http_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}
