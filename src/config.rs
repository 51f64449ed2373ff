use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment (dev, staging, prod)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// CORS allowed origins, comma separated. Any origin when unset.
    pub cors_origins: Option<String>,

    /// Log level used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Store backend: "redis" or "memory"
    #[serde(default = "default_store_backend")]
    pub store_backend: String,

    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Prefix prepended to every store key and topic
    #[serde(default)]
    pub store_prefix: String,

    /// Path to a JSON seed file for new rooms
    pub seed_file: Option<String>,
}

/// Which external store the relay talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl Config {
    /// Load configuration from environment variables or app.env file
    ///
    /// Runs before tracing is set up, so the outcome is logged by the caller.
    pub fn load() -> Result<Self, ConfigError> {
        // Try to load from app.env file first
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            // Fallback to .env file
            dotenvy::dotenv().ok();
        }

        Ok(envy::from_env::<Config>()?)
    }

    /// Get the full server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment.to_lowercase() == "dev" || self.environment.to_lowercase() == "development"
    }

    /// Tracing filter used when RUST_LOG is not set
    pub fn log_filter(&self) -> String {
        if self.is_development() {
            "karte_relay=debug,tower_http=debug,axum::rejection=trace,info".to_string()
        } else {
            format!("karte_relay={},tower_http=info,{}", self.log_level, self.log_level)
        }
    }

    pub fn store_backend(&self) -> Result<StoreBackend, ConfigError> {
        match self.store_backend.trim().to_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }

    /// Allowed CORS origins, or `None` when any origin is accepted
    pub fn cors_origin_list(&self) -> Option<Vec<String>> {
        let origins: Vec<String> = self
            .cors_origins
            .as_deref()?
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
        if origins.is_empty() {
            None
        } else {
            Some(origins)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            cors_origins: None,
            log_level: default_log_level(),
            store_backend: default_store_backend(),
            redis_url: default_redis_url(),
            store_prefix: String::new(),
            seed_file: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    Env(#[from] envy::Error),

    #[error("Unknown store backend '{0}', expected 'redis' or 'memory'")]
    UnknownBackend(String),

    #[error("Failed to read seed file {path}: {source}")]
    SeedIo {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse seed file {path}: {source}")]
    SeedParse {
        path: String,
        source: serde_json::Error,
    },

    #[error("Invalid seed key '{0}': keys must be non-empty and must not contain ':'")]
    InvalidSeedKey(String),
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_store_backend() -> String {
    "redis".to_string()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
