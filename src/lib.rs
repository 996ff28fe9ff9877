pub mod bag;
pub mod config;
pub mod context;
mod error;
pub mod factory;

pub use bag::{normalize, Access, Bag, BagRef, Value};
pub use config::{
    Config, ConfigBuilder, ConfigError, ConfigSource, ObservableConfigSource, SourceEntry,
};
pub use context::AppContext;
pub use error::{Error, Result};
pub use factory::{Close, Creator, Factory, FactoryConfig, Resource};
