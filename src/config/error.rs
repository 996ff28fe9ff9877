use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading configuration sources.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("required config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Environment sources split variable names on their separator, so it can't be empty.
    #[error("environment source '{prefix}' has an empty separator")]
    EmptySeparator { prefix: String },
}
