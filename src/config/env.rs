use parking_lot::Mutex;

use super::source::{ConfigSource, ObservableConfigSource};
use super::ConfigError;
use crate::bag::{Access, Bag, Value};
use crate::Result;

/// A configuration source reading environment variables with a common prefix.
///
/// `PREFIX<sep>DATABASE<sep>HOST=localhost` provides `database.host = "localhost"`.
/// Path segments are lowercased and values are coerced to the most specific type:
/// boolean, integer, float, or string (fallback). The environment is captured when
/// the source is created and again on every reload.
#[derive(Debug)]
pub struct EnvSource {
    prefix: String,
    separator: String,
    priority: i32,
    data: Mutex<Bag>,
}

impl EnvSource {
    /// Captures the variables starting with `prefix` followed by `separator`.
    pub fn new(
        prefix: impl Into<String>,
        separator: impl Into<String>,
        priority: i32,
    ) -> Result<Self, ConfigError> {
        let prefix = prefix.into();
        let separator = separator.into();
        if separator.is_empty() {
            return Err(ConfigError::EmptySeparator { prefix });
        }
        let data = capture(&prefix, &separator);
        Ok(Self {
            prefix,
            separator,
            priority,
            data: Mutex::new(data),
        })
    }
}

impl ConfigSource for EnvSource {
    fn get(&self, path: &str, _params: &Bag) -> Bag {
        self.data.lock().bag(path)
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

impl ObservableConfigSource for EnvSource {
    fn reload(&self) -> Result<bool> {
        let fresh = capture(&self.prefix, &self.separator);
        let mut data = self.data.lock();
        if *data == fresh {
            return Ok(false);
        }
        *data = fresh;
        Ok(true)
    }
}

fn capture(prefix: &str, separator: &str) -> Bag {
    let lead = format!("{prefix}{separator}");
    // entries that aren't valid unicode can't be addressed by a path
    let mut vars: Vec<(String, String)> = std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .filter(|(key, _)| key.starts_with(&lead))
        .collect();
    vars.sort();

    let mut bag = Bag::new();
    for (key, value) in vars {
        let path: Vec<String> = key[lead.len()..]
            .split(separator)
            .map(str::to_lowercase)
            .collect();
        // only fails for paths without any segment, which carry nothing to store
        let _ = bag.set(&path.join("."), coerce_value(&value));
    }
    bag
}

/// Bools, then integers, then decimals; anything else stays a string.
fn coerce_value(raw: &str) -> Value {
    for (word, flag) in [("true", true), ("false", false)] {
        if raw.eq_ignore_ascii_case(word) {
            return Value::Bool(flag);
        }
    }
    if is_integer(raw) {
        if let Ok(n) = raw.parse() {
            return Value::Int(n);
        }
    } else if raw.contains('.') {
        if let Ok(f) = raw.parse() {
            return Value::Float(f);
        }
    }
    Value::String(raw.to_owned())
}

fn is_integer(raw: &str) -> bool {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
