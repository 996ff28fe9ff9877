use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use super::builder::ConfigBuilder;
use super::observer::{Notification, Observers};
use super::source::{ObservableConfigSource, SourceEntry};
use crate::bag::{path, Access, Bag, Value};
use crate::factory::{Close, Factory};
use crate::{Error, Result};

struct Layer {
    id: String,
    entry: SourceEntry,
    seq: u64,
}

#[derive(Default)]
struct State {
    direct: Bag,
    layers: Vec<Layer>,
    next_seq: u64,
    merged: Option<Bag>,
    observers: Observers,
}

impl State {
    /// The merged view: sources by ascending priority, the first registered source
    /// winning ties, then the direct values on top.
    fn merged(&mut self) -> &Bag {
        if self.merged.is_none() {
            let mut layers: Vec<&Layer> = self.layers.iter().collect();
            layers.sort_by_key(|layer| (layer.entry.priority(), Reverse(layer.seq)));

            let mut merged = Bag::new();
            for layer in layers {
                merged.merge(&layer.entry.load());
            }
            merged.merge(&self.direct);
            self.merged = Some(merged);
        }
        self.merged.get_or_insert_with(Bag::new)
    }

    /// Snapshot of the merged view, taken only when someone is watching.
    fn snapshot(&mut self) -> Option<Bag> {
        if self.observers.is_empty() {
            return None;
        }
        Some(self.merged().clone())
    }

    /// Drops the cached view and lists the observers affected since `before`.
    fn settle(&mut self, before: Option<Bag>) -> Vec<Notification> {
        self.merged = None;
        let Some(before) = before else {
            return Vec::new();
        };
        self.merged();
        match &self.merged {
            Some(after) => self.observers.changes(&before, after),
            None => Vec::new(),
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.layers.iter().position(|layer| layer.id == id)
    }
}

/// Layered configuration store.
///
/// Reads resolve against the merged view of every registered [`ConfigSource`] and
/// the values set directly with [`Config::set`], which always win. Sources are
/// ordered by priority; among sources of equal priority the one registered first
/// wins.
///
/// ```
/// use std::sync::Arc;
///
/// use dragon_boot::config::BagSource;
/// use dragon_boot::{Access, Bag, Config, SourceEntry};
///
/// let config = Config::new();
/// let defaults = Bag::from_iter([("field", "value1")]);
/// config.add_source("defaults", SourceEntry::new(Arc::new(BagSource::new(0, defaults))))?;
/// config.set("field", "value2")?;
///
/// assert_eq!(config.string("field"), "value2");
/// # Ok::<(), dragon_boot::Error>(())
/// ```
///
/// [`ConfigSource`]: super::ConfigSource
#[derive(Default)]
pub struct Config {
    state: Mutex<State>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// A config whose direct values start out as `direct`.
    pub(crate) fn with_direct(direct: Bag) -> Self {
        Self {
            state: Mutex::new(State {
                direct,
                ..State::default()
            }),
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Applies `change` and notifies the observers whose merged value changed.
    fn apply<R>(&self, change: impl FnOnce(&mut State) -> Result<R>) -> Result<R> {
        let (result, notifications) = {
            let mut state = self.state.lock();
            let before = state.snapshot();
            let result = change(&mut *state)?;
            (result, state.settle(before))
        };
        notifications.into_iter().for_each(Notification::fire);
        Ok(result)
    }

    /// Sets a direct value, which overrides whatever the sources provide.
    ///
    /// Fails with [`Error::InvalidPath`] for the empty path.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.apply(|state| state.direct.set(path, value))
    }

    /// Registers `callback` to be called with `(old, new)` whenever the merged value
    /// at `path` changes.
    ///
    /// Callbacks run synchronously on the thread making the change, after the config
    /// has been updated, in registration order.
    pub fn add_observer<F>(&self, id: impl Into<String>, path: &str, callback: F) -> Result<()>
    where
        F: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::NilReference("observer id".into()));
        }
        self.state.lock().observers.add(id, path, Arc::new(callback))
    }

    /// Removes every observer registered under `id`.
    pub fn remove_observer(&self, id: &str) {
        self.state.lock().observers.remove(id);
    }

    pub fn has_observer(&self, id: &str, path: &str) -> bool {
        self.state.lock().observers.contains(id, path)
    }

    /// Registers a source under `id`.
    ///
    /// Fails with [`Error::DuplicateResource`] if a source with that id exists.
    pub fn add_source(&self, id: impl Into<String>, entry: SourceEntry) -> Result<()> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::NilReference("source id".into()));
        }
        self.apply(|state| {
            if state.position(&id).is_some() {
                return Err(Error::DuplicateResource(id));
            }
            debug!("adding config source '{id}' with priority {}", entry.priority());
            let seq = state.next_seq;
            state.next_seq += 1;
            state.layers.push(Layer { id, entry, seq });
            Ok(())
        })
    }

    /// Unregisters and closes the source `id`.
    ///
    /// The source is removed even if closing it fails.
    pub fn remove_source(&self, id: &str) -> Result<()> {
        let layer = self.apply(|state| {
            let index = state
                .position(id)
                .ok_or_else(|| Error::UnknownResource(id.to_string()))?;
            debug!("removing config source '{id}'");
            Ok(state.layers.remove(index))
        })?;
        layer.entry.source.close()
    }

    pub fn has_source(&self, id: &str) -> bool {
        self.state.lock().position(id).is_some()
    }

    /// Registered source ids, sorted.
    pub fn sources(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .state
            .lock()
            .layers
            .iter()
            .map(|layer| layer.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Registers every source available from `factory` that is not registered yet.
    ///
    /// Sources are realized in id order; the first failure stops the load.
    pub fn load_sources(&self, factory: &Factory<SourceEntry>) -> Result<()> {
        for id in factory.available() {
            if self.has_source(&id) {
                continue;
            }
            let entry = factory.get(&id)?;
            self.add_source(id, SourceEntry::clone(&entry))?;
        }
        Ok(())
    }

    /// Reloads every observable source.
    ///
    /// Returns whether any of them changed; if so, observers are notified as for a
    /// direct change. Every source is reloaded even if some fail, and the view
    /// reflects whatever the others picked up; the first failure is returned.
    pub fn reload(&self) -> Result<bool> {
        let (result, notifications) = {
            let mut state = self.state.lock();
            let before = state.snapshot();
            let mut changed = false;
            let mut first_error = None;
            for layer in &state.layers {
                let Some(source) = &layer.entry.observable else {
                    continue;
                };
                match source.reload() {
                    Ok(reloaded) => changed |= reloaded,
                    Err(err) => {
                        warn!("failed to reload config source '{}': {err}", layer.id);
                        first_error.get_or_insert(err);
                    }
                }
            }
            if changed {
                debug!("config sources changed on reload");
            }
            let notifications = state.settle(before);
            (first_error.map_or(Ok(changed), Err), notifications)
        };
        notifications.into_iter().for_each(Notification::fire);
        result
    }

    /// Unregisters and closes every source.
    ///
    /// All sources are closed even if some fail; the first failure is returned.
    pub fn close(&self) -> Result<()> {
        let layers = self.apply(|state| Ok(std::mem::take(&mut state.layers)))?;
        let mut first_error = None;
        for layer in layers {
            if let Err(err) = layer.entry.source.close() {
                warn!("failed to close config source '{}': {err}", layer.id);
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Access for Config {
    fn inspect<R>(&self, path: &str, f: impl FnOnce(Option<&Value>) -> R) -> R {
        let value = {
            let mut state = self.state.lock();
            let merged = state.merged();
            if path::segments(path).is_empty() {
                Some(Value::Bag(merged.clone()))
            } else {
                merged.value(path).cloned()
            }
        };
        f(value.as_ref())
    }

    fn entries(&self) -> Vec<String> {
        self.state.lock().merged().entries()
    }
}

impl Close for Config {
    fn close(&self) -> Result<()> {
        Config::close(self)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Config")
            .field("direct", &state.direct)
            .field(
                "sources",
                &state.layers.iter().map(|l| &l.id).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}
