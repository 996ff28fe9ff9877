//! Config sources built from configuration.
//!
//! Sources can themselves be declared in configuration, under [`SOURCES_PATH`]:
//!
//! ```toml
//! [dragon.config.sources.local]
//! driver = "file"
//! file = "config/local.toml"
//! required = false
//! priority = 20
//!
//! [dragon.config.sources.env]
//! driver = "env"
//! prefix = "MYAPP"
//! priority = 10
//! ```
//!
//! Every source config may also carry `path`, the sub-path the source is queried
//! with, and `params`, a table handed to the source on every query.

use std::sync::Arc;

use super::env::EnvSource;
use super::file::FileSource;
use super::source::SourceEntry;
use super::{DEFAULT_ENV_SEPARATOR, SOURCES_PATH};
use crate::bag::{Access, Bag};
use crate::factory::{driver_validator, DriverCreator, Factory, FactoryConfig, Resource};
use crate::{Error, Result};

pub const FILE_DRIVER: &str = "file";
pub const ENV_DRIVER: &str = "env";

const SOURCE_KIND: &str = "config source";

/// Builds a factory for the config sources declared under [`SOURCES_PATH`].
///
/// Pass it to [`Config::load_sources`](super::Config::load_sources) to register them.
pub fn source_factory(config: Arc<dyn FactoryConfig>) -> Factory<SourceEntry> {
    Factory::new(config, SOURCES_PATH)
        .with_validator(driver_validator(SOURCE_KIND))
        .with_creator(DriverCreator::new(FILE_DRIVER, file_source))
        .with_creator(DriverCreator::new(ENV_DRIVER, env_source))
}

fn file_source(config: &Bag) -> Result<Resource<SourceEntry>> {
    let file = config.string("file");
    if file.is_empty() {
        return Err(Error::InvalidResourceConfig {
            kind: SOURCE_KIND.into(),
            id: config.string("id"),
            reason: "missing file".into(),
        });
    }
    let source = FileSource::open(
        file,
        config.bool_or("required", true),
        config.int32("priority"),
    )?;
    Ok(registration(config, SourceEntry::observable(Arc::new(source))))
}

fn env_source(config: &Bag) -> Result<Resource<SourceEntry>> {
    let mut separator = config.string("separator");
    if separator.is_empty() {
        separator = DEFAULT_ENV_SEPARATOR.to_string();
    }
    let source = EnvSource::new(config.string("prefix"), separator, config.int32("priority"))?;
    Ok(registration(config, SourceEntry::observable(Arc::new(source))))
}

fn registration(config: &Bag, entry: SourceEntry) -> Resource<SourceEntry> {
    let entry = entry
        .at_path(config.string("path"))
        .with_params(config.bag("params"));
    Resource::new(Arc::new(entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::Config;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sources_config(file: &NamedTempFile) -> Arc<Config> {
        let config = Arc::new(Config::new());
        let base = SOURCES_PATH;
        config.set(&format!("{base}.local.driver"), "file").unwrap();
        config
            .set(&format!("{base}.local.file"), file.path().display().to_string())
            .unwrap();
        config.set(&format!("{base}.local.priority"), 5).unwrap();
        config.set(&format!("{base}.local.path"), "app").unwrap();
        config
    }

    #[test]
    fn test_load_sources_from_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[app]\nname = \"from-file\"\nport = 9000").unwrap();
        let config = sources_config(&file);
        config.set("port", 1).unwrap();

        let factory = source_factory(config.clone());
        config.load_sources(&factory).unwrap();

        assert!(config.has_source("local"));
        assert_eq!(config.string("name"), "from-file");
        assert_eq!(config.int("port"), 1);

        // already registered sources are skipped
        config.load_sources(&factory).unwrap();
        assert_eq!(config.sources(), vec!["local"]);
    }

    #[test]
    fn test_env_driver_defaults_separator() {
        std::env::set_var("DRAGONDRIVERTEST__LEVEL", "debug");
        let config = Arc::new(Config::new());
        config
            .set(&format!("{SOURCES_PATH}.vars.driver"), ENV_DRIVER)
            .unwrap();
        config
            .set(&format!("{SOURCES_PATH}.vars.prefix"), "DRAGONDRIVERTEST")
            .unwrap();

        config.load_sources(&source_factory(config.clone())).unwrap();

        assert_eq!(config.string("level"), "debug");
    }

    #[test]
    fn test_invalid_source_configs() {
        let config = Arc::new(Config::new());
        config
            .set(&format!("{SOURCES_PATH}.nodriver.file"), "x.toml")
            .unwrap();
        config
            .set(&format!("{SOURCES_PATH}.nofile.driver"), FILE_DRIVER)
            .unwrap();
        config
            .set(&format!("{SOURCES_PATH}.missing.driver"), FILE_DRIVER)
            .unwrap();
        config
            .set(&format!("{SOURCES_PATH}.missing.file"), "/nonexistent/x.toml")
            .unwrap();
        let factory = source_factory(config.clone());

        assert!(matches!(
            factory.get("nodriver"),
            Err(Error::InvalidResourceConfig { reason, .. }) if reason == "missing driver"
        ));
        assert!(matches!(
            factory.get("nofile"),
            Err(Error::InvalidResourceConfig { reason, .. }) if reason == "missing file"
        ));
        assert!(matches!(
            factory.get("missing"),
            Err(Error::Config(ConfigError::FileNotFound(_)))
        ));
    }
}
