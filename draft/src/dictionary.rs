//! Lazy key/value view of a draft item for templating.
//!
//! A [`DraftItemDictionary`] yields the item's id, its properties, its
//! collection items and (when asked) its parent, one pair at a time. Nested
//! items are returned as further dictionaries and are only expanded when a
//! consumer iterates them, so a template engine pays only for what it reads.
//!
//! Ancestry is opt-in and only follows the parent chain: a parent's own
//! properties are offered without ancestry, which keeps every expansion
//! finite.

use serde_json::{Map, Value};

use pattern_toolkit_core::{Identifier, TypedValue};

use crate::item::{DraftItem, SchemaKind};

/// Key of the item id.
pub const ID_KEY: &str = "Id";
/// Key of a collection's items.
pub const ITEMS_KEY: &str = "Items";
/// Key of the parent dictionary, present only with ancestry.
pub const PARENT_KEY: &str = "Parent";

/// Value of one dictionary entry.
#[derive(Debug, Clone)]
pub enum DictionaryValue<'a> {
    Id(&'a Identifier),
    /// An attribute value, or an unmaterialized element.
    Value(Option<&'a TypedValue>),
    Dictionary(DraftItemDictionary<'a>),
    Items(Vec<DraftItemDictionary<'a>>),
}

impl DictionaryValue<'_> {
    /// Expands this value into JSON.
    pub fn to_json(&self) -> Value {
        match self {
            DictionaryValue::Id(id) => Value::String(id.to_string()),
            DictionaryValue::Value(value) => value.map_or(Value::Null, TypedValue::to_json),
            DictionaryValue::Dictionary(dictionary) => dictionary.to_json(),
            DictionaryValue::Items(items) => {
                Value::Array(items.iter().map(DraftItemDictionary::to_json).collect())
            }
        }
    }
}

/// Lazy dictionary view of a draft item.
#[derive(Debug, Clone, Copy)]
pub struct DraftItemDictionary<'a> {
    root: &'a DraftItem,
    item: &'a DraftItem,
    include_ancestry: bool,
}

impl<'a> DraftItemDictionary<'a> {
    /// A view of `item`; `root` is the draft's pattern item, used to follow
    /// parent links.
    pub fn new(root: &'a DraftItem, item: &'a DraftItem) -> Self {
        Self {
            root,
            item,
            include_ancestry: false,
        }
    }

    /// Also yields a [`PARENT_KEY`] entry, recursively up to the root.
    pub fn with_ancestry(mut self) -> Self {
        self.include_ancestry = true;
        self
    }

    pub fn item(&self) -> &'a DraftItem {
        self.item
    }

    /// Iterates the entries: id, properties in order, items, then parent.
    pub fn iter(self) -> impl Iterator<Item = (&'a str, DictionaryValue<'a>)> + 'a {
        let properties = self
            .item
            .properties()
            .into_iter()
            .flat_map(|properties| properties.iter())
            .map(move |(name, child)| (name.as_str(), self.child_value(child)));
        let items = self
            .item
            .items()
            .filter(|_| self.item.kind() == SchemaKind::EphemeralCollection)
            .map(move |items| (ITEMS_KEY, self.items_value(items)));
        let parent = std::iter::once_with(move || self.parent())
            .flatten()
            .map(|parent| (PARENT_KEY, DictionaryValue::Dictionary(parent)));

        std::iter::once((ID_KEY, DictionaryValue::Id(self.item.id())))
            .chain(properties)
            .chain(items)
            .chain(parent)
    }

    /// Looks up a single entry.
    pub fn get(self, key: &str) -> Option<DictionaryValue<'a>> {
        self.iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value)
    }

    /// Expands the whole view into a JSON object.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_json()))
            .collect();
        Value::Object(map)
    }

    fn nested(&self, item: &'a DraftItem) -> Self {
        Self::new(self.root, item)
    }

    fn child_value(&self, child: &'a DraftItem) -> DictionaryValue<'a> {
        match child.kind() {
            SchemaKind::Attribute => DictionaryValue::Value(child.value()),
            SchemaKind::EphemeralCollection => {
                self.items_value(child.items().unwrap_or_default())
            }
            _ if child.is_materialised() => DictionaryValue::Dictionary(self.nested(child)),
            _ => DictionaryValue::Value(None),
        }
    }

    fn items_value(&self, items: &'a [DraftItem]) -> DictionaryValue<'a> {
        DictionaryValue::Items(items.iter().map(|item| self.nested(item)).collect())
    }

    fn parent(&self) -> Option<Self> {
        if !self.include_ancestry {
            return None;
        }
        let parent_id = self.item.parent()?;
        let parent = self.root.find_item(parent_id)?;
        Some(self.nested(parent).with_ancestry())
    }
}
