//! Application context for managing shared application state.

use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::{Mutex, ReentrantMutex};

use crate::config::Config;
use crate::factory::Close;
use crate::{Error, Result};

type Instance = Arc<dyn Any + Send + Sync>;
type Provider = Arc<dyn Fn(&AppContext) -> Result<Instance> + Send + Sync>;

/// Central application context holding the configuration and shared services.
///
/// Services are registered by type with a constructor and built on first
/// [`resolve`](Self::resolve). Constructors receive the context, so they can read
/// the configuration and resolve the services they depend on.
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
///
/// use dragon_boot::{Access, AppContext, Config};
///
/// struct Greeter {
///     name: String,
/// }
///
/// let config = Config::builder().with_value("greeter.name", "dragon").build()?;
/// let ctx = AppContext::new(Arc::new(config));
/// ctx.provide(|ctx: &AppContext| {
///     Ok(Arc::new(Greeter { name: ctx.config().string("greeter.name") }))
/// })?;
///
/// assert_eq!(ctx.resolve::<Greeter>()?.name, "dragon");
/// ctx.shutdown()?;
/// # Ok::<(), dragon_boot::Error>(())
/// ```
pub struct AppContext {
    config: Arc<Config>,
    providers: Mutex<HashMap<TypeId, Provider>>,
    instances: Mutex<HashMap<TypeId, Instance>>,
    closers: Mutex<Vec<(String, Arc<dyn Close>)>>,
    // Serializes resolution across threads; nested resolves on the resolving
    // thread re-enter. Holds the types currently being built.
    resolving: ReentrantMutex<RefCell<Vec<TypeId>>>,
}

impl AppContext {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            providers: Mutex::new(HashMap::new()),
            instances: Mutex::new(HashMap::new()),
            closers: Mutex::new(Vec::new()),
            resolving: ReentrantMutex::new(RefCell::new(Vec::new())),
        }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Registers the constructor of service `T`.
    pub fn provide<T, F>(&self, constructor: F) -> Result<()>
    where
        T: Send + Sync + 'static,
        F: Fn(&AppContext) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        self.register::<T>(Arc::new(move |ctx: &AppContext| {
            let instance: Instance = constructor(ctx)?;
            Ok(instance)
        }))
    }

    /// Like [`provide`](Self::provide), and closes the built service on
    /// [`shutdown`](Self::shutdown).
    pub fn provide_closable<T, F>(&self, constructor: F) -> Result<()>
    where
        T: Close + 'static,
        F: Fn(&AppContext) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        self.register::<T>(Arc::new(move |ctx: &AppContext| {
            let service = constructor(ctx)?;
            ctx.register_closer(type_name::<T>(), service.clone());
            let instance: Instance = service;
            Ok(instance)
        }))
    }

    fn register<T: 'static>(&self, provider: Provider) -> Result<()> {
        let mut providers = self.providers.lock();
        if providers.contains_key(&TypeId::of::<T>()) {
            return Err(Error::DuplicateService(type_name::<T>()));
        }
        providers.insert(TypeId::of::<T>(), provider);
        Ok(())
    }

    pub fn has<T: 'static>(&self) -> bool {
        self.providers.lock().contains_key(&TypeId::of::<T>())
    }

    /// Returns service `T`, building it on first use.
    ///
    /// A failed construction is not cached; the next call tries again.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let key = TypeId::of::<T>();
        if let Some(instance) = self.cached::<T>() {
            return Ok(instance);
        }

        let guard = self.resolving.lock();
        // another thread may have built it while we waited
        if let Some(instance) = self.cached::<T>() {
            return Ok(instance);
        }
        if guard.borrow().contains(&key) {
            return Err(Error::CyclicService(type_name::<T>()));
        }
        let provider = self
            .providers
            .lock()
            .get(&key)
            .cloned()
            .ok_or(Error::UnknownService(type_name::<T>()))?;

        guard.borrow_mut().push(key);
        let built = provider(self);
        guard.borrow_mut().retain(|id| *id != key);

        let instance = built?;
        debug!("built service {}", type_name::<T>());
        self.instances.lock().insert(key, instance.clone());
        Arc::downcast::<T>(instance).map_err(|_| Error::UnknownService(type_name::<T>()))
    }

    fn cached<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let instance = self.instances.lock().get(&TypeId::of::<T>()).cloned()?;
        Arc::downcast::<T>(instance).ok()
    }

    /// Registers `closer` to be closed on [`shutdown`](Self::shutdown).
    pub fn register_closer(&self, name: impl Into<String>, closer: Arc<dyn Close>) {
        self.closers.lock().push((name.into(), closer));
    }

    /// Closes every registered closer, latest first, then the configuration.
    ///
    /// Built services are dropped. All closers run even if some fail; the first
    /// failure is returned.
    pub fn shutdown(&self) -> Result<()> {
        let closers = std::mem::take(&mut *self.closers.lock());
        self.instances.lock().clear();

        let mut first_error = None;
        for (name, closer) in closers.into_iter().rev() {
            debug!("closing {name}");
            if let Err(err) = closer.close() {
                warn!("failed to close {name}: {err}");
                first_error.get_or_insert(err);
            }
        }
        if let Err(err) = self.config.close() {
            warn!("failed to close config: {err}");
            first_error.get_or_insert(err);
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("config", &self.config)
            .field("providers", &self.providers.lock().len())
            .field("instances", &self.instances.lock().len())
            .field("closers", &self.closers.lock().len())
            .finish()
    }
}
