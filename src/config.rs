use anyhow::{anyhow, Result};
use std::env;
use std::path::PathBuf;

/// Application configuration, read from the environment
#[derive(Clone)]
pub struct Config {
    pub port: u16,
    /// Public base URL; OAuth callbacks are built from it
    pub app_url: String,
    /// Encryption key for settings (`base64:<32 bytes>`)
    pub app_key: String,
    pub redis_url: Option<String>,
    /// API key for service-to-service authentication (optional)
    pub api_key: Option<String>,
    /// Admin API key for catalog and settings management (optional)
    pub admin_api_key: Option<String>,
    /// Logo embedded in audit reports; a bundled logo is used when unset
    pub logo_path: Option<PathBuf>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("app_url", &self.app_url)
            .field("redis_url", &self.redis_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("admin_api_key", &self.admin_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("logo_path", &self.logo_path)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let app_url = env::var("APP_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
        url::Url::parse(&app_url).map_err(|e| anyhow!("APP_URL is not a valid URL: {}", e))?;

        Ok(Self {
            // APP_PORT takes precedence over PORT
            port: env::var("APP_PORT")
                .or_else(|_| env::var("PORT"))
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,

            app_url: app_url.trim_end_matches('/').to_string(),

            app_key: env::var("APP_KEY").map_err(|_| {
                anyhow!("APP_KEY env var required (generate one with `grc-audit key:generate`)")
            })?,

            // Redis for persistence (optional, falls back to in-memory)
            redis_url: env::var("REDIS_URL").ok(),

            api_key: env::var("API_KEY").ok(),

            admin_api_key: env::var("ADMIN_API_KEY").ok(),

            logo_path: env::var("LOGO_PATH").ok().map(PathBuf::from),
        })
    }
}

#[cfg(test)]
impl Config {
    /// Configuration for router tests: no keys, in-memory store
    pub fn for_tests() -> Self {
        Self {
            port: 0,
            app_url: "https://grc.example.com".to_string(),
            app_key: "base64:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=".to_string(),
            redis_url: None,
            api_key: None,
            admin_api_key: Some("admin-secret".to_string()),
            logo_path: None,
        }
    }
}
