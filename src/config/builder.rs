use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::env::EnvSource;
use super::file::FileSource;
use super::layered::Config;
use super::source::SourceEntry;
use crate::bag::{Bag, Value};
use crate::Result;

/// A source queued for registration at build time.
#[derive(Debug)]
enum PendingSource {
    File {
        path: PathBuf,
        required: bool,
        priority: i32,
    },
    Env {
        prefix: String,
        separator: String,
        priority: i32,
    },
    Entry {
        id: String,
        entry: SourceEntry,
    },
}

/// A direct write, applied in the order it was given.
#[derive(Debug)]
enum DirectWrite {
    Value(String, Value),
    Bag(Bag),
}

/// Builder for a [`Config`] layered over files, the environment and custom sources.
///
/// Sources are layered by priority, not by registration order; values given with
/// [`with_value`](Self::with_value) and [`with_bag`](Self::with_bag) become direct
/// values and override every source. Later direct values override earlier ones.
///
/// ## Example
///
/// ```no_run
/// use dragon_boot::{Access, Config};
///
/// // defaults < env overrides < local file
/// let config = Config::builder()
///     .with_file("config/default.toml", true, 0)
///     .with_env("MYAPP", "__", 10)
///     .with_file("config/local.toml", false, 20)
///     .build()?;
///
/// let port = config.int_or("server.port", 8080);
/// # Ok::<(), dragon_boot::Error>(())
/// ```
#[derive(Debug, Default)]
#[must_use = "builders do nothing until .build() is called"]
pub struct ConfigBuilder {
    direct: Vec<DirectWrite>,
    sources: Vec<PendingSource>,
}

impl ConfigBuilder {
    /// Sets a direct value at `path`.
    pub fn with_value(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.direct.push(DirectWrite::Value(path.into(), value.into()));
        self
    }

    /// Merges `bag` into the direct values.
    pub fn with_bag(mut self, bag: Bag) -> Self {
        self.direct.push(DirectWrite::Bag(bag));
        self
    }

    /// Adds a TOML file source, registered as `file:<path>`.
    ///
    /// If `required` is `true`, the build will fail if the file doesn't exist.
    pub fn with_file(mut self, path: impl AsRef<Path>, required: bool, priority: i32) -> Self {
        self.sources.push(PendingSource::File {
            path: path.as_ref().to_path_buf(),
            required,
            priority,
        });
        self
    }

    /// Adds an environment source, registered as `env:<prefix>`.
    ///
    /// See [`EnvSource`] for how variables map to paths.
    pub fn with_env(
        mut self,
        prefix: impl Into<String>,
        separator: impl Into<String>,
        priority: i32,
    ) -> Self {
        self.sources.push(PendingSource::Env {
            prefix: prefix.into(),
            separator: separator.into(),
            priority,
        });
        self
    }

    pub fn with_source(mut self, id: impl Into<String>, entry: SourceEntry) -> Self {
        self.sources.push(PendingSource::Entry {
            id: id.into(),
            entry,
        });
        self
    }

    /// Loads every source and builds the config.
    pub fn build(self) -> Result<Config> {
        let mut direct = Bag::new();
        for write in self.direct {
            match write {
                DirectWrite::Value(path, value) => direct.set(&path, value)?,
                DirectWrite::Bag(bag) => direct.merge(&bag),
            }
        }
        let config = Config::with_direct(direct);

        for source in self.sources {
            match source {
                PendingSource::File {
                    path,
                    required,
                    priority,
                } => {
                    let id = format!("file:{}", path.display());
                    let file = FileSource::open(&path, required, priority)?;
                    config.add_source(id, SourceEntry::observable(Arc::new(file)))?;
                }
                PendingSource::Env {
                    prefix,
                    separator,
                    priority,
                } => {
                    let id = format!("env:{prefix}");
                    let env = EnvSource::new(prefix, separator, priority)?;
                    config.add_source(id, SourceEntry::observable(Arc::new(env)))?;
                }
                PendingSource::Entry { id, entry } => config.add_source(id, entry)?,
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BagSource, ConfigError};
    use crate::{Access, Error};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_layers_files_by_priority() {
        let mut low = NamedTempFile::new().unwrap();
        writeln!(low, "name = \"low\"\nport = 1\n[db]\nhost = \"a\"").unwrap();
        let mut high = NamedTempFile::new().unwrap();
        writeln!(high, "name = \"high\"\n[db]\nuser = \"b\"").unwrap();

        let config = Config::builder()
            .with_file(high.path(), true, 10)
            .with_file(low.path(), true, 0)
            .with_value("port", 2)
            .build()
            .unwrap();

        assert_eq!(config.string("name"), "high");
        assert_eq!(config.int("port"), 2);
        assert_eq!(config.string("db.host"), "a");
        assert_eq!(config.string("db.user"), "b");
        assert_eq!(config.sources().len(), 2);
    }

    #[test]
    fn test_missing_required_file_fails() {
        let result = Config::builder()
            .with_file("/nonexistent/path/config.toml", true, 0)
            .build();

        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::FileNotFound(_)))
        ));
    }

    #[test]
    fn test_invalid_value_path_fails() {
        let result = Config::builder().with_value("", 1).build();
        assert!(matches!(result, Err(Error::InvalidPath(_))));
    }

    #[test]
    fn test_custom_sources_and_bags() {
        let mut defaults = Bag::new();
        defaults.set("a.b", 1).unwrap();
        let mut direct = Bag::new();
        direct.set("a.c", 2).unwrap();

        let config = Config::builder()
            .with_source("defaults", SourceEntry::new(Arc::new(BagSource::new(0, defaults))))
            .with_bag(direct)
            .build()
            .unwrap();

        assert_eq!(config.int("a.b"), 1);
        assert_eq!(config.int("a.c"), 2);
        assert!(config.has_source("defaults"));
    }

    #[test]
    fn test_direct_values_apply_in_order() {
        let config = Config::builder()
            .with_value("a", 1)
            .with_bag(Bag::from_iter([("a", 2), ("b", 2)]))
            .with_value("b", 3)
            .build()
            .unwrap();

        assert_eq!(config.int("a"), 2);
        assert_eq!(config.int("b"), 3);
    }

    #[test]
    fn test_bag_keys_are_not_split() {
        let config = Config::builder()
            .with_bag(Bag::from_iter([("x.y", 1)]))
            .build()
            .unwrap();

        assert_eq!(config.entries(), vec!["x.y"]);
        assert!(!config.has("x"));
    }

    #[test]
    fn test_env_layer() {
        std::env::set_var("DRAGONBUILDERTEST__NAME", "from-env");

        let config = Config::builder()
            .with_value("name", "direct")
            .with_env("DRAGONBUILDERTEST", "__", 0)
            .build()
            .unwrap();

        assert_eq!(config.string("name"), "direct");
        assert!(config.has_source("env:DRAGONBUILDERTEST"));
    }
}
