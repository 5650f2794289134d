use anyhow::{Context, Result};

const DEFAULT_GOODBYE: &str = "Thank you for applying! The hiring team will review your \
    application and get back to you soon.";

/// Which backend serves the opportunity read-through cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Memory,
    Redis,
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub embedding_api_url: String,
    pub embedding_api_key: String,
    pub embedding_model: String,
    /// Plan-limit collaborator. `None` allows every submission.
    pub submission_limit_url: Option<String>,
    pub opportunity_cache_ttl_secs: u64,
    pub cache_backend: CacheBackend,
    pub retrieval_top_k: usize,
    pub goodbye_message: String,
    pub public_file_base_url: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let s3_endpoint = require_env("S3_ENDPOINT")?;
        let s3_bucket = require_env("S3_BUCKET")?;
        let public_file_base_url = std::env::var("PUBLIC_FILE_BASE_URL")
            .unwrap_or_else(|_| format!("{}/{}", s3_endpoint.trim_end_matches('/'), s3_bucket));

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket,
            s3_endpoint,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            embedding_api_url: std::env::var("EMBEDDING_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            embedding_api_key: require_env("EMBEDDING_API_KEY")?,
            embedding_model: std::env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            submission_limit_url: std::env::var("SUBMISSION_LIMIT_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            opportunity_cache_ttl_secs: parse_env("OPPORTUNITY_CACHE_TTL_SECS", 60)?,
            cache_backend: parse_cache_backend(
                &std::env::var("CACHE_BACKEND").unwrap_or_else(|_| "memory".to_string()),
            )?,
            retrieval_top_k: parse_env("RETRIEVAL_TOP_K", 4)?,
            goodbye_message: std::env::var("GOODBYE_MESSAGE")
                .unwrap_or_else(|_| DEFAULT_GOODBYE.to_string()),
            public_file_base_url,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn parse_cache_backend(raw: &str) -> Result<CacheBackend> {
    match raw.trim().to_lowercase().as_str() {
        "memory" => Ok(CacheBackend::Memory),
        "redis" => Ok(CacheBackend::Redis),
        other => anyhow::bail!("CACHE_BACKEND must be 'memory' or 'redis', got '{other}'"),
    }
}
