//! Server configuration from environment variables.

use std::env;

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address, from `HOST` (default `0.0.0.0`).
    pub host: String,
    /// Bind port, from `PORT` (default `3001`).
    pub port: u16,
    /// PostgreSQL connection string, from `DATABASE_URL` (required).
    pub database_url: String,
    /// `CORS_ORIGIN`: `*` or a comma-separated list of allowed origins.
    pub cors_origin: String,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        let cors_origin = env::var("CORS_ORIGIN").unwrap_or_else(|_| "*".to_string());

        Ok(Self {
            host,
            port,
            database_url,
            cors_origin,
        })
    }

    /// The `host:port` string the listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Origins named by `CORS_ORIGIN`, or `None` for the `*` wildcard.
    pub fn cors_origins(&self) -> Option<Vec<String>> {
        let raw = self.cors_origin.trim();
        if raw.is_empty() || raw == "*" {
            return None;
        }
        Some(
            raw.split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("PORT must be a valid port number")]
    InvalidPort,
}
