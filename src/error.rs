use std::error::Error as StdError;

use thiserror::Error;

use crate::bag::PopulateError;
use crate::config::ConfigError;

/// Top-level error type for the dragon-boot library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid path: '{0}'")]
    InvalidPath(String),

    #[error("missing reference: {0}")]
    NilReference(String),

    #[error("unknown resource: {0}")]
    UnknownResource(String),

    #[error("duplicate resource: {0}")]
    DuplicateResource(String),

    #[error("observer '{id}' is already registered on '{path}'")]
    DuplicateConfigObserver { id: String, path: String },

    #[error("no creator accepts the config of resource '{0}'")]
    UnacceptedResourceConfig(String),

    #[error("invalid {kind} config for '{id}': {reason}")]
    InvalidResourceConfig {
        kind: String,
        id: String,
        reason: String,
    },

    #[error("no provider registered for {0}")]
    UnknownService(&'static str),

    #[error("a provider is already registered for {0}")]
    DuplicateService(&'static str),

    #[error("{0} depends on itself")]
    CyclicService(&'static str),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to populate value: {0}")]
    Populate(#[from] PopulateError),

    /// An error raised by a creator, config source or closer, passed through as is.
    #[error(transparent)]
    Collaborator(Box<dyn StdError + Send + Sync>),
}

impl Error {
    /// Wraps an error raised outside this crate.
    pub fn collaborator(err: impl StdError + Send + Sync + 'static) -> Self {
        Error::Collaborator(Box::new(err))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
