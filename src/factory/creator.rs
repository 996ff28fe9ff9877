use super::Resource;
use crate::bag::{Access, Bag};
use crate::{Error, Result};

/// Builds resources of capability `T` from their configuration.
pub trait Creator<T: ?Sized>: Send + Sync {
    /// Whether this creator can build a resource from `config`.
    fn accept(&self, config: &Bag) -> bool;

    fn create(&self, config: &Bag) -> Result<Resource<T>>;
}

type Build<T> = Box<dyn Fn(&Bag) -> Result<Resource<T>> + Send + Sync>;

/// A [`Creator`] selected by the `driver` field of the resource config.
pub struct DriverCreator<T: ?Sized> {
    driver: String,
    build: Build<T>,
}

impl<T: ?Sized> DriverCreator<T> {
    pub fn new<F>(driver: impl Into<String>, build: F) -> Self
    where
        F: Fn(&Bag) -> Result<Resource<T>> + Send + Sync + 'static,
    {
        Self {
            driver: driver.into(),
            build: Box::new(build),
        }
    }
}

impl<T: ?Sized> Creator<T> for DriverCreator<T> {
    fn accept(&self, config: &Bag) -> bool {
        config.string("driver") == self.driver
    }

    fn create(&self, config: &Bag) -> Result<Resource<T>> {
        (self.build)(config)
    }
}

/// Validates resource configs before any creator sees them.
pub type Validator = Box<dyn Fn(&str, &Bag) -> Result<()> + Send + Sync>;

/// A validator rejecting configs without a non-empty `driver` string.
///
/// `kind` names the resource kind in the resulting [`Error::InvalidResourceConfig`].
pub fn driver_validator(kind: impl Into<String>) -> Validator {
    let kind = kind.into();
    Box::new(move |id, config| {
        if config.string("driver").is_empty() {
            return Err(Error::InvalidResourceConfig {
                kind: kind.clone(),
                id: id.to_string(),
                reason: "missing driver".into(),
            });
        }
        Ok(())
    })
}
