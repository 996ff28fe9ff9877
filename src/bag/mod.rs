//! Dynamic, path-addressed configuration and data trees.
//!
//! A [`Bag`] maps string keys to [`Value`]s, which may themselves be bags. Nested
//! entries are addressed with dotted paths such as `"database.primary.host"`; empty
//! segments are ignored and the empty path denotes the bag itself.
//!
//! ```
//! use dragon_boot::{Access, Bag};
//!
//! let mut bag = Bag::new();
//! bag.set("server.port", 8080)?;
//!
//! assert!(bag.has("server..port"));
//! assert_eq!(bag.int("server.port"), 8080);
//! assert_eq!(bag.string_or("server.host", "localhost".into()), "localhost");
//! # Ok::<(), dragon_boot::Error>(())
//! ```

mod access;
mod de;
mod normalize;
pub mod path;
mod value;

use std::collections::btree_map::{self, BTreeMap};

use serde::ser::{Serialize, Serializer};

use crate::{Error, Result};

pub use access::Access;
pub use de::PopulateError;
pub use normalize::normalize;
pub use value::{BagRef, FromValue, Value};

/// A mapping from string keys to [`Value`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bag {
    entries: BTreeMap<String, Value>,
}

impl Bag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the top-level entries.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.entries.iter()
    }

    /// Looks up a top-level key without interpreting it as a path.
    pub fn get_key(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Inserts a top-level entry without interpreting `key` as a path.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    /// Resolves `path` to a borrowed value.
    ///
    /// Traversal only descends through containers; a scalar in the middle of the path
    /// resolves to `None`. The empty path has no borrowed value and also yields `None`,
    /// use [`Access::get`] to read the bag itself.
    pub fn value(&self, path: &str) -> Option<&Value> {
        let segments = path::segments(path);
        let (last, parents) = segments.split_last()?;

        let mut current = self;
        for segment in parents {
            current = current.entries.get(*segment)?.as_bag()?;
        }
        current.entries.get(*last)
    }

    /// Stores `value` at `path`, creating intermediate bags as needed.
    ///
    /// Any non-container value found along the way is replaced by an empty bag.
    /// Fails with [`Error::InvalidPath`] for the empty path.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let segments = path::segments(path);
        let Some((last, parents)) = segments.split_last() else {
            return Err(Error::InvalidPath(path.to_string()));
        };

        let mut current = self;
        for segment in parents {
            current = current.child_mut(segment);
        }
        current.entries.insert((*last).to_string(), value.into());
        Ok(())
    }

    /// Removes and returns the value at `path`.
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        let segments = path::segments(path);
        let (last, parents) = segments.split_last()?;

        let mut current = self;
        for segment in parents {
            current = current.entries.get_mut(*segment)?.as_bag_mut()?;
        }
        current.entries.remove(*last)
    }

    /// Deep-merges `source` into this bag.
    ///
    /// Containers present on both sides are merged recursively; anything else in
    /// `source` replaces the existing value.
    pub fn merge(&mut self, source: &Bag) {
        for (key, value) in &source.entries {
            if let (Some(existing), Some(overlay)) = (self.entries.get_mut(key), value.as_bag()) {
                if let Some(target) = existing.as_bag_mut() {
                    target.merge(overlay);
                    continue;
                }
            }
            self.entries.insert(key.clone(), value.clone());
        }
    }

    fn child_mut(&mut self, key: &str) -> &mut Bag {
        let slot = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Value::Bag(Bag::new()));
        if !slot.is_bag() {
            *slot = Value::Bag(Bag::new());
        }
        match slot {
            Value::Bag(bag) => bag,
            Value::Ref(shared) => shared.make_mut(),
            _ => unreachable!("slot holds a container"),
        }
    }
}

impl Access for Bag {
    fn inspect<R>(&self, path: &str, f: impl FnOnce(Option<&Value>) -> R) -> R {
        if path::segments(path).is_empty() {
            let root = Value::Bag(self.clone());
            return f(Some(&root));
        }
        f(self.value(path))
    }

    fn entries(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn has(&self, path: &str) -> bool {
        path::segments(path).is_empty() || self.value(path).is_some()
    }
}

impl<K: ToString, V: Into<Value>> FromIterator<(K, V)> for Bag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Bag {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Bag {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl From<toml::Table> for Bag {
    fn from(table: toml::Table) -> Self {
        table.into_iter().collect()
    }
}

impl Serialize for Bag {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(&self.entries)
    }
}
