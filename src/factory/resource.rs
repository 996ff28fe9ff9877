use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::Result;

/// Capability of releasing whatever a resource holds open.
pub trait Close: Send + Sync {
    fn close(&self) -> Result<()>;
}

type CloseHook = Box<dyn Fn() -> Result<()> + Send + Sync>;

/// A shared resource together with its optional close hook.
///
/// Whether a resource can be closed is decided once, when it is wrapped: use
/// [`Resource::closable`] for types implementing [`Close`], [`Resource::with_close`]
/// for anything else that needs cleanup and [`Resource::new`] otherwise.
pub struct Resource<T: ?Sized> {
    inner: Arc<T>,
    close: Option<CloseHook>,
}

impl<T: ?Sized + Send + Sync + 'static> Resource<T> {
    pub fn new(inner: Arc<T>) -> Self {
        Self { inner, close: None }
    }

    pub fn with_close<F>(inner: Arc<T>, close: F) -> Self
    where
        F: Fn(&T) -> Result<()> + Send + Sync + 'static,
    {
        let target = Arc::clone(&inner);
        Self {
            inner,
            close: Some(Box::new(move || close(&*target))),
        }
    }

    pub fn closable(inner: Arc<T>) -> Self
    where
        T: Close,
    {
        Self::with_close(inner, |resource| resource.close())
    }
}

impl<T: ?Sized> Resource<T> {
    /// Returns a new handle to the underlying resource.
    pub fn get(&self) -> Arc<T> {
        Arc::clone(&self.inner)
    }

    pub fn is_closable(&self) -> bool {
        self.close.is_some()
    }

    /// Runs the close hook, if any, consuming the resource.
    pub fn close(self) -> Result<()> {
        match self.close {
            Some(close) => close(),
            None => Ok(()),
        }
    }
}

impl<T: ?Sized> Deref for Resource<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: ?Sized> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("closable", &self.is_closable())
            .finish_non_exhaustive()
    }
}
