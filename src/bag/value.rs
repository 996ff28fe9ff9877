use std::collections::{BTreeMap, HashMap};
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use serde::ser::{Serialize, Serializer};

use super::Bag;

/// A dynamic value stored in a [`Bag`].
#[derive(Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    String(String),
    Duration(Duration),
    List(Vec<Value>),
    Bag(Bag),
    Ref(BagRef),
}

/// A shared, read-only handle to a [`Bag`].
///
/// Reads look straight through the handle. Cloning the enclosing value produces an
/// owned copy of the referenced bag, and writes that descend through a handle copy it
/// first, so containers never observe each other's mutations.
#[derive(Debug, Clone, Default)]
pub struct BagRef(Arc<Bag>);

impl BagRef {
    pub fn new(bag: Bag) -> Self {
        Self(Arc::new(bag))
    }

    /// Returns an owned copy of the referenced bag.
    pub fn to_bag(&self) -> Bag {
        (*self.0).clone()
    }

    pub(crate) fn make_mut(&mut self) -> &mut Bag {
        Arc::make_mut(&mut self.0)
    }
}

impl Deref for BagRef {
    type Target = Bag;

    fn deref(&self) -> &Bag {
        &self.0
    }
}

impl PartialEq for BagRef {
    fn eq(&self, other: &Self) -> bool {
        *self.0 == *other.0
    }
}

impl Value {
    /// Name of the value's kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Duration(_) => "duration",
            Value::List(_) => "list",
            Value::Bag(_) => "bag",
            Value::Ref(_) => "bag reference",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for containers and references to containers.
    pub fn is_bag(&self) -> bool {
        matches!(self, Value::Bag(_) | Value::Ref(_))
    }

    /// Returns the container this value holds or refers to.
    pub fn as_bag(&self) -> Option<&Bag> {
        match self {
            Value::Bag(bag) => Some(bag),
            Value::Ref(shared) => Some(shared),
            _ => None,
        }
    }

    /// Mutable access to the container; a reference is copied before it is handed out.
    pub fn as_bag_mut(&mut self) -> Option<&mut Bag> {
        match self {
            Value::Bag(bag) => Some(bag),
            Value::Ref(shared) => Some(shared.make_mut()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl Clone for Value {
    fn clone(&self) -> Self {
        match self {
            Value::Null => Value::Null,
            Value::Bool(b) => Value::Bool(*b),
            Value::Int(i) => Value::Int(*i),
            Value::Uint(u) => Value::Uint(*u),
            Value::Float(f) => Value::Float(*f),
            Value::String(s) => Value::String(s.clone()),
            Value::Duration(d) => Value::Duration(*d),
            Value::List(items) => Value::List(items.clone()),
            Value::Bag(bag) => Value::Bag(bag.clone()),
            Value::Ref(shared) => Value::Bag(shared.to_bag()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Uint(a), Value::Uint(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => match (self.as_bag(), other.as_bag()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Uint(u) => serializer.serialize_u64(*u),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Duration(d) => {
                serializer.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            }
            Value::List(items) => serializer.collect_seq(items),
            Value::Bag(bag) => bag.serialize(serializer),
            Value::Ref(shared) => shared.serialize(serializer),
        }
    }
}

macro_rules! from_scalar {
    ($variant:ident: $($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value.into())
                }
            }
        )*
    };
}

from_scalar!(Int: i8, i16, i32, i64);
from_scalar!(Uint: u8, u16, u32, u64);
from_scalar!(Float: f32, f64);
from_scalar!(String: String, &str);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<isize> for Value {
    fn from(value: isize) -> Self {
        Value::Int(value as i64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Uint(value as u64)
    }
}

impl From<Duration> for Value {
    fn from(value: Duration) -> Self {
        Value::Duration(value)
    }
}

impl From<Bag> for Value {
    fn from(value: Bag) -> Self {
        Value::Bag(value)
    }
}

impl From<BagRef> for Value {
    fn from(value: BagRef) -> Self {
        Value::Ref(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl<K: ToString, V: Into<Value>> From<HashMap<K, V>> for Value {
    fn from(map: HashMap<K, V>) -> Self {
        Value::Bag(map.into_iter().collect())
    }
}

impl<K: ToString, V: Into<Value>> From<BTreeMap<K, V>> for Value {
    fn from(map: BTreeMap<K, V>) -> Self {
        Value::Bag(map.into_iter().collect())
    }
}

impl From<toml::Value> for Value {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Int(i),
            toml::Value::Float(f) => Value::Float(f),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(dt) => Value::String(dt.to_string()),
            toml::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            toml::Value::Table(table) => Value::Bag(Bag::from(table)),
        }
    }
}

/// Conversion from a stored [`Value`] into a concrete Rust type.
///
/// Returns `None` when the stored kind does not match the requested type.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

macro_rules! from_value_int {
    ($variant:ident: $($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::$variant(n) => <$ty>::try_from(*n).ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

from_value_int!(Int: i8, i16, i32, i64);
from_value_int!(Uint: u8, u16, u32, u64);

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(f) => Some(*f as f32),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }
}

/// Durations may also be stored as integer milliseconds.
impl FromValue for Duration {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Duration(d) => Some(*d),
            Value::Int(ms) => u64::try_from(*ms).ok().map(Duration::from_millis),
            Value::Uint(ms) => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }
}

impl FromValue for Vec<Value> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::List(items) => Some(items.clone()),
            _ => None,
        }
    }
}

impl FromValue for Vec<String> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::List(items) => items.iter().map(String::from_value).collect(),
            _ => None,
        }
    }
}

impl FromValue for HashMap<String, Value> {
    fn from_value(value: &Value) -> Option<Self> {
        let bag = value.as_bag()?;
        Some(bag.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

impl FromValue for HashMap<String, String> {
    fn from_value(value: &Value) -> Option<Self> {
        value
            .as_bag()?
            .iter()
            .map(|(k, v)| String::from_value(v).map(|s| (k.clone(), s)))
            .collect()
    }
}

impl FromValue for Bag {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bag().cloned()
    }
}
