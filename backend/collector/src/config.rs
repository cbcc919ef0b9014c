//! Application configuration loaded from environment variables.

use crate::errors::{CollectorError, Result};

/// Settings for the collector service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./card_events.db".to_string()),
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .map_err(|_| CollectorError::Config("Invalid API_PORT".to_string()))?,
        })
    }
}

/// Settings for an [`HttpSink`](crate::sink::HttpSink) embedded next to a registry.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Base URL of the collector (e.g. http://localhost:3001)
    pub collector_url: String,
    /// Name the collector files this registry's notifications under
    pub source: String,
    /// Delivery attempts per notification before it is dropped
    pub max_attempts: u32,
}

impl SinkConfig {
    pub fn from_env() -> Result<Self> {
        let max_attempts: u32 = env_var("SINK_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map_err(|_| CollectorError::Config("Invalid SINK_MAX_ATTEMPTS".to_string()))?;
        if max_attempts == 0 {
            return Err(CollectorError::Config(
                "SINK_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        Ok(SinkConfig {
            collector_url: env_var("COLLECTOR_URL").map_err(|_| {
                CollectorError::Config("COLLECTOR_URL environment variable is required".to_string())
            })?,
            source: env_var("SINK_SOURCE").unwrap_or_else(|_| "card-registry".to_string()),
            max_attempts,
        })
    }

    /// Full URL of the ingest endpoint.
    pub fn ingest_url(&self) -> String {
        format!("{}/notifications", self.collector_url.trim_end_matches('/'))
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| CollectorError::Config(format!("Missing env var: {key}")))
}
