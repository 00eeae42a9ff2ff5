use serde::Deserialize;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub google_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    /// Upper bound for one inference call, in seconds.
    pub ai_timeout_secs: u64,
    pub product_cache_ttl_secs: u64,
}

/// Scheme and host of a database URL; credentials, path and query are dropped.
pub fn redacted_database_url(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(parsed) => format!(
            "{}://{}",
            parsed.scheme(),
            parsed.host_str().unwrap_or("<no host>")
        ),
        Err(_) => "<unparseable url>".to_string(),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .or_else(|_| std::env::var("DB_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DATABASE_URL or DB_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DATABASE_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            google_api_key: std::env::var("GOOGLE_API_KEY")
                .map_err(|_| anyhow::anyhow!("GOOGLE_API_KEY environment variable required"))
                .and_then(|key| {
                    if key.trim().is_empty() {
                        anyhow::bail!("GOOGLE_API_KEY cannot be empty");
                    }
                    Ok(key)
                })?,
            gemini_model: std::env::var("GEMINI_MODEL")
                .ok()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            gemini_base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            ai_timeout_secs: std::env::var("AI_TIMEOUT_SECS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("AI_TIMEOUT_SECS must be a positive integer"))
                .and_then(|secs: u64| {
                    if secs == 0 {
                        anyhow::bail!("AI_TIMEOUT_SECS must be greater than 0");
                    }
                    Ok(secs)
                })?,
            product_cache_ttl_secs: std::env::var("PRODUCT_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PRODUCT_CACHE_TTL_SECS must be an integer"))?,
        };

        if !config.gemini_base_url.starts_with("http://")
            && !config.gemini_base_url.starts_with("https://")
        {
            anyhow::bail!("GEMINI_BASE_URL must start with http:// or https://");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Database: {}", redacted_database_url(&config.database_url));
        tracing::debug!("Gemini Base URL: {}", config.gemini_base_url);
        tracing::debug!("Gemini Model: {}", config.gemini_model);
        tracing::debug!("AI timeout: {}s", config.ai_timeout_secs);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}
