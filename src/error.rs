//! Error types for the chat context crate

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, ContextError>;

/// Errors surfaced at the configuration and input edges.
///
/// The context core itself has no failure modes: malformed message fields
/// degrade to empty content and numeric knobs are clamped to their floors.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Invalid message history: {0}")]
    InvalidHistory(#[from] serde_json::Error),
}
