//! Deserialization of bags into typed structures.

use std::fmt;

use serde::de::value::{MapDeserializer, SeqDeserializer, StrDeserializer};
use serde::de::{self, DeserializeOwned, Deserializer, IntoDeserializer, Visitor};
use thiserror::Error;

use super::Value;

/// Error raised while populating a typed structure from a bag.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PopulateError(String);

impl de::Error for PopulateError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        PopulateError(msg.to_string())
    }
}

pub(crate) fn from_value<T: DeserializeOwned>(value: &Value) -> Result<T, PopulateError> {
    T::deserialize(ValueDeserializer(value))
}

#[derive(Clone, Copy)]
struct ValueDeserializer<'a>(&'a Value);

impl<'de> IntoDeserializer<'de, PopulateError> for ValueDeserializer<'_> {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}

impl<'de> Deserializer<'de> for ValueDeserializer<'_> {
    type Error = PopulateError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, PopulateError> {
        match self.0 {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(*b),
            Value::Int(i) => visitor.visit_i64(*i),
            Value::Uint(u) => visitor.visit_u64(*u),
            Value::Float(f) => visitor.visit_f64(*f),
            Value::String(s) => visitor.visit_str(s),
            Value::Duration(d) => visitor.visit_map(MapDeserializer::new(
                [("secs", d.as_secs()), ("nanos", u64::from(d.subsec_nanos()))].into_iter(),
            )),
            Value::List(items) => {
                visitor.visit_seq(SeqDeserializer::new(items.iter().map(ValueDeserializer)))
            }
            Value::Bag(_) | Value::Ref(_) => {
                let bag = self.0.as_bag().into_iter().flatten();
                visitor.visit_map(MapDeserializer::new(
                    bag.map(|(key, value)| (key.as_str(), ValueDeserializer(value))),
                ))
            }
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, PopulateError> {
        match self.0 {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, PopulateError> {
        visitor.visit_newtype_struct(self)
    }

    /// Keys are matched against field names ignoring ASCII case.
    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, PopulateError> {
        let Some(bag) = self.0.as_bag() else {
            return self.deserialize_any(visitor);
        };
        let entries = bag.iter().map(|(key, value)| {
            let field = fields
                .iter()
                .find(|field| field.eq_ignore_ascii_case(key))
                .copied()
                .unwrap_or(key.as_str());
            (field, ValueDeserializer(value))
        });
        visitor.visit_map(MapDeserializer::new(entries))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, PopulateError> {
        match self.0 {
            Value::String(s) => {
                let variant: StrDeserializer<'_, PopulateError> = s.as_str().into_deserializer();
                visitor.visit_enum(variant)
            }
            _ => self.deserialize_any(visitor),
        }
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map identifier ignored_any
    }
}
