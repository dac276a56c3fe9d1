//! Application configuration loaded from environment variables.
//!
//! The configuration is built once in `main` and handed to the components
//! that need it.
//!
//! ## Variables
//!
//! - `HOST` - Bind host (default: `0.0.0.0`)
//! - `PORT` - Bind port (default: `8080`)
//! - `DATABASE_URL` - Path to the database file (default: `data.db`)
//! - `APP_NAME` - Service name used in logs (default: `linkmap`)
//! - `APP_VERSION` - Version stamped on new mappings (default: crate version)
//! - `ENV_TYPE` - Deployment environment label (default: `dev`)
//! - `RUST_LOG` - Log filter (default: `linkmap=debug,tower_http=debug`)
//! - `LOG_FORMAT` - `text` or `json` (default: `text`)
//! - `CORS_ALLOW_ORIGINS` - Comma-separated origins or `*` (default: `*`)
//! - `MAX_SHORT_KEY_LENGTH` - Upper bound for generated key length (default: 64)

use anyhow::{bail, Context, Result};
use std::env;
use std::str::FromStr;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => bail!("unknown log format `{}` (expected `text` or `json`)", other),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub app_name: String,
    pub app_version: String,
    pub env_type: String,
    pub log_filter: String,
    pub log_format: LogFormat,
    /// Empty means any origin is allowed.
    pub cors_allow_origins: Vec<String>,
    pub max_short_key_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_path: "data.db".to_string(),
            app_name: "linkmap".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            env_type: "dev".to_string(),
            log_filter: "linkmap=debug,tower_http=debug".to_string(),
            log_format: LogFormat::Text,
            cors_allow_origins: Vec::new(),
            max_short_key_length: 64,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric or enum variable cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            Some(v) => v
                .parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got `{}`", v))?,
            None => defaults.port,
        };

        let log_format = match lookup("LOG_FORMAT") {
            Some(v) => v.parse::<LogFormat>().context("invalid LOG_FORMAT")?,
            None => defaults.log_format,
        };

        let max_short_key_length = match lookup("MAX_SHORT_KEY_LENGTH") {
            Some(v) => v
                .parse::<usize>()
                .with_context(|| format!("MAX_SHORT_KEY_LENGTH must be an integer, got `{}`", v))?,
            None => defaults.max_short_key_length,
        };
        if max_short_key_length == 0 {
            bail!("MAX_SHORT_KEY_LENGTH must be at least 1");
        }

        let cors_allow_origins = lookup("CORS_ALLOW_ORIGINS")
            .map(|v| parse_origins(&v))
            .unwrap_or(defaults.cors_allow_origins);

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port,
            database_path: lookup("DATABASE_URL").unwrap_or(defaults.database_path),
            app_name: lookup("APP_NAME").unwrap_or(defaults.app_name),
            app_version: lookup("APP_VERSION").unwrap_or(defaults.app_version),
            env_type: lookup("ENV_TYPE").unwrap_or(defaults.env_type),
            log_filter: lookup("RUST_LOG").unwrap_or(defaults.log_filter),
            log_format,
            cors_allow_origins,
            max_short_key_length,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `*` (or an empty list) allows any origin.
fn parse_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();

    if origins.iter().any(|o| o == "*") {
        Vec::new()
    } else {
        origins
    }
}
