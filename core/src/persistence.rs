//! Dehydrate/rehydrate contract.
//!
//! Every persisted entity maps itself to an ordered property bag
//! ([`PersistableProperties`]) and back. The mapping is written by hand per
//! entity; nested entities are stored as nested bags and rebuilt through a
//! [`PersistableFactory`], which checks the declared type of each bag.
//!
//! Parent links are never dehydrated. Callers rebuild them with the ancestry
//! passes after rehydration.
//!
//! The byte format is left to the caller; bags convert to and from
//! [`serde_json::Value`] with their key order preserved.

use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::{Result, ToolkitError};
use crate::identifier::Identifier;

/// Key holding the declared type of a bag.
pub const TYPE_KEY: &str = "Type";

/// An entity that can be dehydrated to, and rehydrated from, a property bag.
pub trait Persistable: Sized {
    /// Declared type name written under [`TYPE_KEY`].
    const TYPE_NAME: &'static str;

    /// Maps this entity to an ordered property bag.
    fn dehydrate(&self) -> PersistableProperties;

    /// Rebuilds an entity from a bag produced by [`dehydrate`](Self::dehydrate).
    ///
    /// # Errors
    ///
    /// Returns [`ToolkitError::Persistence`] when a key is missing or holds
    /// a value of the wrong shape.
    fn rehydrate(properties: &PersistableProperties, factory: &PersistableFactory)
    -> Result<Self>;
}

/// Ordered key/value bag produced by [`Persistable::dehydrate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistableProperties {
    entity: &'static str,
    values: Map<String, Value>,
}

impl PersistableProperties {
    /// Creates a bag for an entity of type `T`, starting with its [`TYPE_KEY`].
    pub fn for_type<T: Persistable>() -> Self {
        let mut values = Map::new();
        values.insert(TYPE_KEY.to_string(), Value::String(T::TYPE_NAME.to_string()));
        Self {
            entity: T::TYPE_NAME,
            values,
        }
    }

    /// Wraps a JSON object read back from storage.
    ///
    /// # Errors
    ///
    /// Returns [`ToolkitError::Persistence`] if `value` is not an object.
    pub fn from_value(entity: &'static str, value: Value) -> Result<Self> {
        match value {
            Value::Object(values) => Ok(Self { entity, values }),
            other => Err(ToolkitError::persistence(
                entity,
                format!("expected an object, found {other}"),
            )),
        }
    }

    /// Converts the bag into a JSON object, keeping key order.
    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }

    /// Returns the keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Returns the raw value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns the declared type, if present.
    pub fn declared_type(&self) -> Option<&str> {
        self.values.get(TYPE_KEY).and_then(Value::as_str)
    }

    /// Stores a plain value.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Stores an optional value as JSON `null` when absent.
    pub fn set_opt<V: Into<Value>>(&mut self, key: &str, value: Option<V>) {
        self.values
            .insert(key.to_string(), value.map_or(Value::Null, Into::into));
    }

    /// Stores a nested entity as a nested bag.
    pub fn set_child<T: Persistable>(&mut self, key: &str, child: &T) {
        self.values
            .insert(key.to_string(), child.dehydrate().into_value());
    }

    /// Stores a list of nested entities, preserving order.
    pub fn set_list<'a, T: Persistable + 'a>(
        &mut self,
        key: &str,
        items: impl IntoIterator<Item = &'a T>,
    ) {
        let list = items
            .into_iter()
            .map(|item| item.dehydrate().into_value())
            .collect();
        self.values.insert(key.to_string(), Value::Array(list));
    }

    fn require(&self, key: &str) -> Result<&Value> {
        self.values
            .get(key)
            .ok_or_else(|| ToolkitError::persistence(self.entity, format!("missing '{key}'")))
    }

    fn wrong_type(&self, key: &str, expected: &str) -> ToolkitError {
        ToolkitError::persistence(self.entity, format!("'{key}' is not {expected}"))
    }

    /// Reads a required string.
    pub fn string(&self, key: &str) -> Result<String> {
        self.require(key)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.wrong_type(key, "a string"))
    }

    /// Reads an optional string; `null` and missing keys are `None`.
    pub fn opt_string(&self, key: &str) -> Result<Option<String>> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.wrong_type(key, "a string")),
        }
    }

    /// Reads a required boolean.
    pub fn bool(&self, key: &str) -> Result<bool> {
        self.require(key)?
            .as_bool()
            .ok_or_else(|| self.wrong_type(key, "a boolean"))
    }

    /// Reads a required identifier.
    pub fn identifier(&self, key: &str) -> Result<Identifier> {
        self.string(key).map(Identifier::from_existing)
    }

    /// Reads an optional identifier.
    pub fn opt_identifier(&self, key: &str) -> Result<Option<Identifier>> {
        Ok(self.opt_string(key)?.map(Identifier::from_existing))
    }

    /// Reads a required string and parses it with [`FromStr`].
    pub fn parse<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.string(key)?;
        raw.parse()
            .map_err(|e| ToolkitError::persistence(self.entity, format!("'{key}': {e}")))
    }

    /// Reads a list of strings.
    pub fn strings(&self, key: &str) -> Result<Vec<String>> {
        match self.require(key)? {
            Value::Array(values) => values
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| self.wrong_type(key, "a list of strings"))
                })
                .collect(),
            _ => Err(self.wrong_type(key, "a list")),
        }
    }

    /// Reads a required nested entity.
    pub fn child<T: Persistable>(&self, key: &str, factory: &PersistableFactory) -> Result<T> {
        factory.rehydrate(self.require(key)?.clone())
    }

    /// Reads a list of nested entities, preserving order.
    pub fn list<T: Persistable>(&self, key: &str, factory: &PersistableFactory) -> Result<Vec<T>> {
        match self.require(key)? {
            Value::Array(values) => values
                .iter()
                .map(|value| factory.rehydrate(value.clone()))
                .collect(),
            _ => Err(self.wrong_type(key, "a list")),
        }
    }
}

/// Resolves nested bags back into typed entities by their declared type.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersistableFactory;

impl PersistableFactory {
    /// Creates a factory.
    pub fn new() -> Self {
        Self
    }

    /// Rehydrates a `T` from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`ToolkitError::Persistence`] if `value` is not an object, or
    /// if its declared type is not `T`'s.
    pub fn rehydrate<T: Persistable>(&self, value: Value) -> Result<T> {
        let properties = PersistableProperties::from_value(T::TYPE_NAME, value)?;
        if let Some(declared) = properties.declared_type() {
            if declared != T::TYPE_NAME {
                return Err(ToolkitError::persistence(
                    T::TYPE_NAME,
                    format!("declared type is '{declared}'"),
                ));
            }
        }
        T::rehydrate(&properties, self)
    }
}
