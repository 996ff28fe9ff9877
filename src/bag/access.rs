use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;

use super::{de, Bag, FromValue, Value};
use crate::{Error, Result};

macro_rules! typed_accessors {
    ($($name:ident, $name_or:ident => $ty:ty;)*) => {
        $(
            #[doc = concat!("Reads `path` as `", stringify!($ty), "`, or its zero value.")]
            fn $name(&self, path: &str) -> $ty {
                self.get_as(path).unwrap_or_default()
            }

            #[doc = concat!("Reads `path` as `", stringify!($ty), "`, or `default`.")]
            fn $name_or(&self, path: &str, default: $ty) -> $ty {
                self.get_as(path).unwrap_or(default)
            }
        )*
    };
}

/// Read access to a path-addressed tree of [`Value`]s.
///
/// Implemented by [`Bag`] and by the layered [`Config`](crate::Config). Every typed
/// accessor comes in two forms: `x(path)` falls back to the kind's zero value and
/// `x_or(path, default)` to the given default. Both fall back when the path is absent
/// and when the stored value has a different kind.
pub trait Access {
    /// Calls `f` with the value at `path`, or `None` if nothing is stored there.
    ///
    /// The empty path always resolves to the whole tree.
    fn inspect<R>(&self, path: &str, f: impl FnOnce(Option<&Value>) -> R) -> R;

    /// Top-level keys, in no particular order.
    fn entries(&self) -> Vec<String>;

    fn has(&self, path: &str) -> bool {
        self.inspect(path, |value| value.is_some())
    }

    fn lookup(&self, path: &str) -> Option<Value> {
        self.inspect(path, |value| value.cloned())
    }

    /// Returns the value at `path`, or [`Value::Null`].
    fn get(&self, path: &str) -> Value {
        self.lookup(path).unwrap_or_default()
    }

    /// Returns the value at `path`, or `default`. The empty path ignores the default.
    fn get_or(&self, path: &str, default: impl Into<Value>) -> Value {
        self.lookup(path).unwrap_or_else(|| default.into())
    }

    fn get_as<T: FromValue>(&self, path: &str) -> Option<T> {
        self.inspect(path, |value| value.and_then(T::from_value))
    }

    /// Deserializes the container at `path` into `T`.
    ///
    /// Struct fields match keys case-insensitively and honor `#[serde(rename)]`.
    /// Fails with [`Error::InvalidPath`] if `path` does not hold a container.
    fn populate<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.inspect(path, |value| match value {
            Some(value) if value.is_bag() => Ok(de::from_value(value)?),
            _ => Err(Error::InvalidPath(path.to_string())),
        })
    }

    typed_accessors! {
        bool, bool_or => bool;
        int, int_or => i64;
        int8, int8_or => i8;
        int16, int16_or => i16;
        int32, int32_or => i32;
        int64, int64_or => i64;
        uint, uint_or => u64;
        uint8, uint8_or => u8;
        uint16, uint16_or => u16;
        uint32, uint32_or => u32;
        uint64, uint64_or => u64;
        float32, float32_or => f32;
        float64, float64_or => f64;
        string, string_or => String;
        string_slice, string_slice_or => Vec<String>;
        slice, slice_or => Vec<Value>;
        string_map, string_map_or => HashMap<String, Value>;
        string_map_string, string_map_string_or => HashMap<String, String>;
        duration, duration_or => Duration;
        bag, bag_or => Bag;
    }
}
