use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use yellowstone_events::DEFAULT_POLL_TIMEOUT;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub web_host: String,
    pub web_port: u16,
    /// How long `/poll` holds a request before answering 304.
    pub poll_timeout: Duration,
    /// Permissive CORS for browser clients served from another origin.
    pub enable_cross_origin: bool,
    /// `LOG_FORMAT=json` switches the subscriber to JSON lines.
    pub json_logs: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Unset keys take their defaults; set keys
    /// that do not parse are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| "sqlite:yellowstone.db".to_string()),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            web_host: lookup("WEB_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            web_port: parse_or(&lookup, "WEB_PORT", 8334)?,
            poll_timeout: Duration::from_secs(parse_or(&lookup, "POLL_TIMEOUT_SECS", DEFAULT_POLL_TIMEOUT.as_secs())?),
            enable_cross_origin: lookup("ENABLE_CROSS_ORIGIN").is_some_and(|v| !v.is_empty()),
            json_logs: lookup("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
        };
        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.web_host, self.web_port)
    }

    pub fn log_config(&self) {
        info!(
            database_url = %self.database_url,
            db_max_connections = self.db_max_connections,
            addr = %self.bind_addr(),
            poll_timeout_secs = self.poll_timeout.as_secs(),
            cross_origin = self.enable_cross_origin,
            "Config loaded"
        );
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a number, got {raw:?}")),
        None => Ok(default),
    }
}
