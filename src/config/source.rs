use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::bag::{Access, Bag};
use crate::Result;

/// A prioritized provider of configuration values.
///
/// Sources are queried and reloaded while the owning [`Config`](super::Config) is
/// locked and must not call back into it.
pub trait ConfigSource: Send + Sync {
    /// Returns the tree found at `path`, using `params` as source-specific options.
    fn get(&self, path: &str, params: &Bag) -> Bag;

    /// Higher priorities override lower ones.
    fn priority(&self) -> i32;

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// A source whose content can change after registration.
pub trait ObservableConfigSource: ConfigSource {
    /// Refreshes the source, returning whether its content changed.
    fn reload(&self) -> Result<bool>;
}

/// A source registration: the source plus the path and parameters it is queried with.
#[derive(Clone)]
pub struct SourceEntry {
    pub(crate) source: Arc<dyn ConfigSource>,
    pub(crate) observable: Option<Arc<dyn ObservableConfigSource>>,
    pub(crate) path: String,
    pub(crate) params: Bag,
}

impl SourceEntry {
    pub fn new(source: Arc<dyn ConfigSource>) -> Self {
        Self {
            source,
            observable: None,
            path: String::new(),
            params: Bag::new(),
        }
    }

    /// Registers a source that also takes part in [`Config::reload`](super::Config::reload).
    pub fn observable<S: ObservableConfigSource + 'static>(source: Arc<S>) -> Self {
        let observable: Arc<dyn ObservableConfigSource> = source.clone();
        Self {
            observable: Some(observable),
            ..Self::new(source)
        }
    }

    /// Sets the path the source is queried with.
    pub fn at_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_params(mut self, params: Bag) -> Self {
        self.params = params;
        self
    }

    pub fn priority(&self) -> i32 {
        self.source.priority()
    }

    pub(crate) fn load(&self) -> Bag {
        self.source.get(&self.path, &self.params)
    }
}

impl fmt::Debug for SourceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceEntry")
            .field("priority", &self.priority())
            .field("observable", &self.observable.is_some())
            .field("path", &self.path)
            .field("params", &self.params)
            .finish()
    }
}

/// An in-memory source.
///
/// Its content can be swapped with [`BagSource::replace`]; the change becomes
/// visible on the next reload of the owning config.
#[derive(Debug)]
pub struct BagSource {
    priority: i32,
    data: Mutex<Bag>,
    dirty: AtomicBool,
}

impl BagSource {
    pub fn new(priority: i32, data: Bag) -> Self {
        Self {
            priority,
            data: Mutex::new(data),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn replace(&self, data: Bag) {
        *self.data.lock() = data;
        self.dirty.store(true, Ordering::SeqCst);
    }
}

impl ConfigSource for BagSource {
    fn get(&self, path: &str, _params: &Bag) -> Bag {
        self.data.lock().bag(path)
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

impl ObservableConfigSource for BagSource {
    fn reload(&self) -> Result<bool> {
        Ok(self.dirty.swap(false, Ordering::SeqCst))
    }
}
