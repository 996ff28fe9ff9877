//! Layered configuration.
//!
//! A [`Config`] combines values set directly on it with the trees provided by any
//! number of prioritized [`ConfigSource`]s, and notifies observers when the merged
//! value at a path changes.

mod builder;
mod driver;
mod env;
mod error;
mod file;
mod layered;
mod observer;
mod source;

pub use builder::ConfigBuilder;
pub use driver::{source_factory, ENV_DRIVER, FILE_DRIVER};
pub use env::EnvSource;
pub use error::ConfigError;
pub use file::FileSource;
pub use layered::Config;
pub use observer::ObserverFn;
pub use source::{BagSource, ConfigSource, ObservableConfigSource, SourceEntry};

/// Base path of the config source definitions read by [`source_factory`].
pub const SOURCES_PATH: &str = "dragon.config.sources";

/// Separator used by environment sources when none is configured.
pub const DEFAULT_ENV_SEPARATOR: &str = "__";
