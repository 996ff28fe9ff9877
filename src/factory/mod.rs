//! Driver-based resource factories.
//!
//! A [`Factory`] turns the resource configs found under a base path into live
//! resources. Each config is handed to the registered [`Creator`]s in order and the
//! first one that accepts it builds the resource.
//!
//! ```
//! use std::sync::Arc;
//!
//! use dragon_boot::factory::{driver_validator, DriverCreator};
//! use dragon_boot::{Access, Bag, Factory, Resource};
//!
//! let mut config = Bag::new();
//! config.set("caches.main.driver", "memory")?;
//! config.set("caches.main.size", 128)?;
//!
//! let caches: Factory<Vec<u8>> = Factory::new(Arc::new(config), "caches")
//!     .with_validator(driver_validator("cache"))
//!     .with_creator(DriverCreator::new("memory", |config: &Bag| {
//!         Ok(Resource::new(Arc::new(vec![0; config.int("size") as usize])))
//!     }));
//!
//! assert_eq!(caches.get("main")?.len(), 128);
//! # Ok::<(), dragon_boot::Error>(())
//! ```

mod creator;
mod resource;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::bag::{Access, Bag};
use crate::{Error, Result};

pub use creator::{driver_validator, Creator, DriverCreator, Validator};
pub use resource::{Close, Resource};

/// Source of the configuration a [`Factory`] reads its resource configs from.
///
/// The factory asks for its section on every call, so changes to the underlying
/// configuration show up immediately.
pub trait FactoryConfig: Send + Sync {
    fn section(&self, base_path: &str) -> Bag;
}

impl<A: Access + Send + Sync> FactoryConfig for A {
    fn section(&self, base_path: &str) -> Bag {
        self.bag(base_path)
    }
}

/// How a resource came to be held by a factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Handed over through [`Factory::store`].
    Stored,
    /// Built from configuration.
    Generated,
}

struct Entry<T: ?Sized> {
    resource: Resource<T>,
    origin: Origin,
}

/// Creates, caches and disposes named resources of capability `T`.
pub struct Factory<T: ?Sized> {
    config: Arc<dyn FactoryConfig>,
    base_path: String,
    creators: Vec<Box<dyn Creator<T>>>,
    validator: Option<Validator>,
    resources: Mutex<BTreeMap<String, Entry<T>>>,
    generating: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<T: ?Sized + Send + Sync + 'static> Factory<T> {
    /// Creates a factory reading resource configs from `base_path` of `config`.
    pub fn new(config: Arc<dyn FactoryConfig>, base_path: impl Into<String>) -> Self {
        Self {
            config,
            base_path: base_path.into(),
            creators: Vec::new(),
            validator: None,
            resources: Mutex::new(BTreeMap::new()),
            generating: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a creator. Creators are consulted in registration order.
    pub fn with_creator(mut self, creator: impl Creator<T> + 'static) -> Self {
        self.add_creator(creator);
        self
    }

    pub fn add_creator(&mut self, creator: impl Creator<T> + 'static) {
        self.creators.push(Box::new(creator));
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    fn section(&self) -> Bag {
        self.config.section(&self.base_path)
    }

    fn is_configured(&self, id: &str) -> bool {
        self.section().get_key(id).is_some()
    }

    /// Ids that are configured or held, sorted and without duplicates.
    pub fn available(&self) -> Vec<String> {
        let mut ids: BTreeSet<String> = self.section().entries().into_iter().collect();
        ids.extend(self.resources.lock().keys().cloned());
        ids.into_iter().collect()
    }

    /// Ids currently holding a live resource, sorted.
    pub fn stored(&self) -> Vec<String> {
        self.resources.lock().keys().cloned().collect()
    }

    /// Whether `id` is configured or held.
    pub fn has(&self, id: &str) -> bool {
        let held = self.resources.lock().contains_key(id);
        held || self.is_configured(id)
    }

    /// Whether a held resource was stored or generated.
    pub fn origin(&self, id: &str) -> Option<Origin> {
        self.resources.lock().get(id).map(|entry| entry.origin)
    }

    /// Hands over a resource built elsewhere.
    ///
    /// Fails with [`Error::DuplicateResource`] if `id` is configured or already held.
    pub fn store(&self, id: impl Into<String>, resource: Resource<T>) -> Result<()> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::NilReference("resource id".into()));
        }
        if self.is_configured(&id) {
            return Err(Error::DuplicateResource(id));
        }

        let mut resources = self.resources.lock();
        if resources.contains_key(&id) {
            return Err(Error::DuplicateResource(id));
        }
        debug!("storing resource '{id}' in '{}'", self.base_path);
        resources.insert(
            id,
            Entry {
                resource,
                origin: Origin::Stored,
            },
        );
        Ok(())
    }

    /// Returns the config of `id` with an injected `id` field.
    pub fn config(&self, id: &str) -> Result<Bag> {
        let mut config = match self.section().get_key(id) {
            Some(value) => value.as_bag().cloned().unwrap_or_default(),
            None => return Err(Error::UnknownResource(id.to_string())),
        };
        config.insert("id", id);
        Ok(config)
    }

    /// Returns the held resource for `id`, generating and keeping it on first use.
    ///
    /// Concurrent callers asking for the same missing id wait for a single
    /// generation and share its result.
    pub fn get(&self, id: &str) -> Result<Arc<T>> {
        if let Some(entry) = self.resources.lock().get(id) {
            return Ok(entry.resource.get());
        }

        let gate = Arc::clone(self.generating.lock().entry(id.to_string()).or_default());
        let guard = gate.lock();
        let result = self.get_or_generate(id);

        // drop the gate only once no other caller is queued on it
        let mut generating = self.generating.lock();
        if Arc::strong_count(&gate) == 2 {
            generating.remove(id);
        }
        drop(generating);
        drop(guard);
        result
    }

    fn get_or_generate(&self, id: &str) -> Result<Arc<T>> {
        if let Some(entry) = self.resources.lock().get(id) {
            return Ok(entry.resource.get());
        }

        let resource = self.generate(id)?;
        let shared = resource.get();
        self.resources.lock().insert(
            id.to_string(),
            Entry {
                resource,
                origin: Origin::Generated,
            },
        );
        Ok(shared)
    }

    /// Builds a fresh resource for `id` without consulting or filling the cache.
    ///
    /// The caller owns the result and is responsible for closing it.
    pub fn generate(&self, id: &str) -> Result<Resource<T>> {
        let config = self.config(id)?;
        if let Some(validate) = &self.validator {
            validate(id, &config)?;
        }

        let creator = self
            .creators
            .iter()
            .find(|creator| creator.accept(&config))
            .ok_or_else(|| Error::UnacceptedResourceConfig(id.to_string()))?;
        debug!("generating resource '{id}' in '{}'", self.base_path);
        creator.create(&config)
    }

    /// Generates every configured resource that is not held yet.
    ///
    /// Stops at the first failure; resources generated before it are kept.
    pub fn generate_all(&self) -> Result<()> {
        for id in self.section().entries() {
            self.get(&id)?;
        }
        Ok(())
    }

    /// Drops the held resource for `id`, closing it if it can be closed.
    ///
    /// The id is removed even when closing fails.
    pub fn remove(&self, id: &str) -> Result<()> {
        let entry = self
            .resources
            .lock()
            .remove(id)
            .ok_or_else(|| Error::UnknownResource(id.to_string()))?;
        debug!("removing resource '{id}' from '{}'", self.base_path);
        entry.resource.close()
    }

    /// Drops and closes every held resource.
    ///
    /// All resources are closed even if some fail; the first failure is returned.
    pub fn remove_all(&self) -> Result<()> {
        let entries = std::mem::take(&mut *self.resources.lock());
        let mut first_error = None;
        for (id, entry) in entries {
            if let Err(err) = entry.resource.close() {
                warn!("failed to close resource '{id}' in '{}': {err}", self.base_path);
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl<T: ?Sized + Send + Sync + 'static> Close for Factory<T> {
    fn close(&self) -> Result<()> {
        self.remove_all()
    }
}

impl<T: ?Sized> fmt::Debug for Factory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("base_path", &self.base_path)
            .field("creators", &self.creators.len())
            .field("stored", &self.resources.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::Config;

    #[derive(Debug)]
    struct Connection {
        id: String,
        closed: AtomicBool,
        fail_close: bool,
    }

    impl Connection {
        fn new(id: &str) -> Self {
            Self {
                id: id.to_string(),
                closed: AtomicBool::new(false),
                fail_close: false,
            }
        }
    }

    impl Close for Connection {
        fn close(&self) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            if self.fail_close {
                return Err(Error::collaborator(std::io::Error::other(format!(
                    "cannot close {}",
                    self.id
                ))));
            }
            Ok(())
        }
    }

    fn connection_creator(created: Arc<AtomicUsize>) -> DriverCreator<Connection> {
        DriverCreator::new("mock", move |config: &Bag| {
            created.fetch_add(1, Ordering::SeqCst);
            if config.bool("broken") {
                return Err(Error::collaborator(std::io::Error::other("connection refused")));
            }
            let mut connection = Connection::new(&config.string("id"));
            connection.fail_close = config.bool("fail_close");
            Ok(Resource::closable(Arc::new(connection)))
        })
    }

    fn config() -> Bag {
        let mut bag = Bag::new();
        bag.set("connections.zulu.driver", "mock").unwrap();
        bag.set("connections.alpha.driver", "mock").unwrap();
        bag
    }

    fn factory_with(bag: Bag) -> (Factory<Connection>, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicUsize::new(0));
        let factory = Factory::new(Arc::new(bag), "connections")
            .with_validator(driver_validator("connection"))
            .with_creator(connection_creator(Arc::clone(&created)));
        (factory, created)
    }

    fn factory() -> Factory<Connection> {
        factory_with(config()).0
    }

    #[test]
    fn test_available_is_sorted_union() {
        let factory = factory();
        assert_eq!(factory.available(), vec!["alpha", "zulu"]);
        assert!(factory.stored().is_empty());

        factory
            .store("mike", Resource::new(Arc::new(Connection::new("mike"))))
            .unwrap();
        factory.get("zulu").unwrap();

        assert_eq!(factory.available(), vec!["alpha", "mike", "zulu"]);
        assert_eq!(factory.stored(), vec!["mike", "zulu"]);
        assert_eq!(factory.origin("mike"), Some(Origin::Stored));
        assert_eq!(factory.origin("zulu"), Some(Origin::Generated));
        assert_eq!(factory.origin("alpha"), None);
    }

    #[test]
    fn test_has() {
        let factory = factory();
        factory
            .store("mike", Resource::new(Arc::new(Connection::new("mike"))))
            .unwrap();

        assert!(factory.has("alpha"));
        assert!(factory.has("mike"));
        assert!(!factory.has("missing"));
    }

    #[test]
    fn test_store_duplicates() {
        let factory = factory();
        let resource = || Resource::new(Arc::new(Connection::new("x")));

        factory.store("x", resource()).unwrap();
        assert!(matches!(
            factory.store("x", resource()),
            Err(Error::DuplicateResource(id)) if id == "x"
        ));
        assert!(matches!(
            factory.store("alpha", resource()),
            Err(Error::DuplicateResource(_))
        ));
        assert!(matches!(
            factory.store("", resource()),
            Err(Error::NilReference(_))
        ));
    }

    #[test]
    fn test_generate_injects_id_and_is_uncached() {
        let (factory, created) = factory_with(config());

        let first = factory.generate("alpha").unwrap();
        let second = factory.generate("alpha").unwrap();

        assert_eq!(first.id, "alpha");
        assert!(!Arc::ptr_eq(&first.get(), &second.get()));
        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert!(factory.stored().is_empty());
    }

    #[test]
    fn test_get_is_cached() {
        let (factory, created) = factory_with(config());

        let first = factory.get("alpha").unwrap();
        let second = factory.get("alpha").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_returns_stored() {
        let factory = factory();
        let stored = Arc::new(Connection::new("mike"));
        factory
            .store("mike", Resource::new(Arc::clone(&stored)))
            .unwrap();

        assert!(Arc::ptr_eq(&factory.get("mike").unwrap(), &stored));
    }

    #[test]
    fn test_generate_errors() {
        let mut bag = config();
        bag.set("connections.nodriver.size", 1).unwrap();
        bag.set("connections.other.driver", "postgres").unwrap();
        bag.set("connections.broken.driver", "mock").unwrap();
        bag.set("connections.broken.broken", true).unwrap();
        let (factory, _) = factory_with(bag);

        assert!(matches!(
            factory.generate("missing"),
            Err(Error::UnknownResource(_))
        ));
        assert!(matches!(
            factory.get("nodriver"),
            Err(Error::InvalidResourceConfig { .. })
        ));
        assert!(matches!(
            factory.get("other"),
            Err(Error::UnacceptedResourceConfig(id)) if id == "other"
        ));

        let err = factory.get("broken").unwrap_err();
        assert_eq!(err.to_string(), "connection refused");
        assert!(!factory.has("missing"));
        assert!(factory.stored().is_empty());
    }

    #[test]
    fn test_generate_all_stops_at_first_error() {
        let mut bag = config();
        bag.set("connections.mike.driver", "unknown").unwrap();
        let (factory, _) = factory_with(bag);

        assert!(matches!(
            factory.generate_all(),
            Err(Error::UnacceptedResourceConfig(id)) if id == "mike"
        ));
        assert_eq!(factory.stored(), vec!["alpha"]);
    }

    #[test]
    fn test_generate_all_skips_held() {
        let (factory, created) = factory_with(config());
        factory.get("alpha").unwrap();

        factory.generate_all().unwrap();

        assert_eq!(factory.stored(), vec!["alpha", "zulu"]);
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_remove_closes() {
        let factory = factory();
        let connection = factory.get("alpha").unwrap();

        factory.remove("alpha").unwrap();

        assert!(connection.closed.load(Ordering::SeqCst));
        assert!(factory.stored().is_empty());
        assert!(matches!(
            factory.remove("alpha"),
            Err(Error::UnknownResource(_))
        ));
        assert!(matches!(
            factory.remove("zulu"),
            Err(Error::UnknownResource(_))
        ));
    }

    #[test]
    fn test_remove_reports_close_error() {
        let mut bag = config();
        bag.set("connections.alpha.fail_close", true).unwrap();
        let (factory, _) = factory_with(bag);
        factory.get("alpha").unwrap();

        assert!(factory.remove("alpha").is_err());
        assert!(factory.stored().is_empty());
    }

    #[test]
    fn test_remove_all_closes_everything() {
        let mut bag = config();
        bag.set("connections.alpha.fail_close", true).unwrap();
        bag.set("connections.beta.driver", "mock").unwrap();
        bag.set("connections.beta.fail_close", true).unwrap();
        let (factory, _) = factory_with(bag);
        factory.generate_all().unwrap();
        let held: Vec<_> = factory
            .stored()
            .iter()
            .map(|id| factory.get(id).unwrap())
            .collect();

        let err = factory.remove_all().unwrap_err();

        assert_eq!(err.to_string(), "cannot close alpha");
        assert!(held.iter().all(|c| c.closed.load(Ordering::SeqCst)));
        assert!(factory.stored().is_empty());
    }

    #[test]
    fn test_concurrent_get_generates_once() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let factory = Arc::new(
            Factory::<Connection>::new(Arc::new(config()), "connections").with_creator(
                DriverCreator::new("mock", move |config: &Bag| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    Ok(Resource::new(Arc::new(Connection::new(&config.string("id")))))
                }),
            ),
        );
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let factory = Arc::clone(&factory);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    factory.get("alpha").unwrap()
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_failing_generations_never_overlap() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let attempts = Arc::new(AtomicUsize::new(0));
        let (active_in, peak_in, attempts_in) = (active.clone(), peak.clone(), attempts.clone());
        let factory = Arc::new(
            Factory::<Connection>::new(Arc::new(config()), "connections").with_creator(
                DriverCreator::new("mock", move |_: &Bag| {
                    attempts_in.fetch_add(1, Ordering::SeqCst);
                    let now = active_in.fetch_add(1, Ordering::SeqCst) + 1;
                    peak_in.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    active_in.fetch_sub(1, Ordering::SeqCst);
                    Err(Error::collaborator(std::io::Error::other("unreachable")))
                }),
            ),
        );
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let factory = Arc::clone(&factory);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..4 {
                        assert!(factory.get("alpha").is_err());
                    }
                })
            })
            .collect();
        handles.into_iter().for_each(|h| h.join().unwrap());

        assert_eq!(attempts.load(Ordering::SeqCst), 32);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(factory.generating.lock().is_empty());
    }

    #[test]
    fn test_reads_live_config() {
        let config = Arc::new(Config::new());
        let factory: Factory<Connection> = Factory::new(config.clone(), "connections")
            .with_creator(connection_creator(Arc::new(AtomicUsize::new(0))));
        assert!(factory.available().is_empty());

        config.set("connections.late.driver", "mock").unwrap();

        assert_eq!(factory.available(), vec!["late"]);
        assert_eq!(factory.get("late").unwrap().id, "late");
    }
}
