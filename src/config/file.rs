//! File-based configuration source.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use parking_lot::Mutex;

use super::source::{ConfigSource, ObservableConfigSource};
use super::ConfigError;
use crate::bag::{Access, Bag};
use crate::Result;

/// A configuration source backed by a TOML file.
///
/// Files can be marked as required or optional. Required files that don't exist
/// cause an error; optional files that don't exist provide no values. Keys are
/// normalized on load, so lookups are case-insensitive.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    required: bool,
    priority: i32,
    data: Mutex<Bag>,
}

impl FileSource {
    /// Loads the file at `path`.
    pub fn open(
        path: impl AsRef<Path>,
        required: bool,
        priority: i32,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let data = load_config_file(&path, required)?;
        Ok(Self {
            path,
            required,
            priority,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileSource {
    fn get(&self, path: &str, _params: &Bag) -> Bag {
        self.data.lock().bag(path)
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

impl ObservableConfigSource for FileSource {
    /// Re-reads the file, reporting whether its content changed.
    fn reload(&self) -> Result<bool> {
        let fresh = load_config_file(&self.path, self.required)?;
        let mut data = self.data.lock();
        if *data == fresh {
            return Ok(false);
        }
        debug!("config file '{}' changed", self.path.display());
        *data = fresh;
        Ok(true)
    }
}

/// Reads `path` into a normalized bag; a missing optional file reads as empty.
fn load_config_file(path: &Path, required: bool) -> Result<Bag, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            if required {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
            return Ok(Bag::new());
        }
        Err(source) => {
            return Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let table: toml::Table = toml::from_str(&contents).map_err(|source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Bag::from(table).normalized())
}
