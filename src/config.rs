//! Configuration loading for the chat context stack
//!
//! Layered sources: built-in defaults, an optional `context.toml` next to
//! the working directory, then `CHAT_CONTEXT__*` environment overrides
//! (e.g. `CHAT_CONTEXT__CONTEXT__MAX_TOKENS=8192`).

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Context window settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSettings {
    /// Total context window size in tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Tokens held back for the model response
    #[serde(default = "default_reserve_tokens")]
    pub reserve_tokens: usize,
}

fn default_max_tokens() -> usize {
    4096
}

fn default_reserve_tokens() -> usize {
    512
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            reserve_tokens: default_reserve_tokens(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default tracing filter, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub context: ContextSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Out-of-range token values are not rejected here; the context manager
    /// clamps them to its floors.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::with_name("context").required(false))
            .add_source(config::Environment::with_prefix("CHAT_CONTEXT").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
