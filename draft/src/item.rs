//! Draft items and materialization.
//!
//! A draft is a tree of [`DraftItem`]s, one per pattern, element, collection,
//! collection item and attribute. Each item names its schema by id and kind
//! ([`SchemaRef`]) and resolves it against a toolkit on demand.
//!
//! Items start out sparse. Materializing an element builds its properties
//! from the schema (attributes take their defaults, child elements become
//! placeholders unless the schema auto-creates them); materializing a
//! collection gives it an item list.
//!
//! Collection items are unnamed by users. They carry the collection's name,
//! and their parent link skips the collection, so the path of an item is
//! `<parent>.<collection>.<item id>`.
//!
//! # Examples
//!
//! ```
//! use pattern_toolkit_core::{
//!     Cardinality, DataType, NewAttribute, NewElement, PatternDefinition, ToolkitDefinition,
//!     VersionInstruction, VersioningPolicy,
//! };
//! use pattern_toolkit_draft::{DraftContext, DraftItem};
//!
//! let mut pattern = PatternDefinition::new("Blog").unwrap();
//! let post = pattern
//!     .edit_root()
//!     .add_element(NewElement::new("Post").with_cardinality(Cardinality::ZeroOrMany))
//!     .unwrap();
//! pattern
//!     .edit(&post)
//!     .unwrap()
//!     .add_attribute(NewAttribute::new("body", DataType::String))
//!     .unwrap();
//! let (toolkit, _) = ToolkitDefinition::package(
//!     &mut pattern,
//!     &VersionInstruction::auto(),
//!     &VersioningPolicy::default(),
//!     Vec::new(),
//! )
//! .unwrap();
//!
//! let context = DraftContext::new(&toolkit);
//! let mut model = DraftItem::new_pattern(&context);
//! let item_id = model
//!     .property_mut("Post")
//!     .unwrap()
//!     .materialise_collection_item(&context)
//!     .unwrap()
//!     .id()
//!     .clone();
//!
//! let item = model.find_item(&item_id).unwrap();
//! assert_eq!(item.fully_qualified_path(&model), format!("Blog.Post.{item_id}"));
//! assert_eq!(item.path_reference(&model), format!("{{Blog.Post.{item_id}}}"));
//! ```

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use pattern_toolkit_core::{
    AttributeSchema, Cardinality, DataType, DraftPolicy, ElementSchema, Identifier, Persistable,
    PersistableFactory, PersistableProperties, Result, ToolkitDefinition, ToolkitError,
    TypedValue, is_valid_data_type, set_value,
};

/// Which kind of schema node a draft item materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaKind {
    Pattern,
    /// An element of cardinality `One` or `ZeroOrOne`.
    Element,
    /// The list node of a `OneOrMany` or `ZeroOrMany` element.
    EphemeralCollection,
    /// One entry of an ephemeral collection.
    CollectionItem,
    Attribute,
}

impl SchemaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaKind::Pattern => "Pattern",
            SchemaKind::Element => "Element",
            SchemaKind::EphemeralCollection => "EphemeralCollection",
            SchemaKind::CollectionItem => "CollectionItem",
            SchemaKind::Attribute => "Attribute",
        }
    }

    /// Returns `true` for the kinds whose schema is an element schema.
    pub fn is_element_like(&self) -> bool {
        matches!(
            self,
            SchemaKind::Pattern
                | SchemaKind::Element
                | SchemaKind::EphemeralCollection
                | SchemaKind::CollectionItem
        )
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaKind {
    type Err = ToolkitError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Pattern" => Ok(SchemaKind::Pattern),
            "Element" => Ok(SchemaKind::Element),
            "EphemeralCollection" => Ok(SchemaKind::EphemeralCollection),
            "CollectionItem" => Ok(SchemaKind::CollectionItem),
            "Attribute" => Ok(SchemaKind::Attribute),
            other => Err(ToolkitError::persistence(
                "DraftItem",
                format!("unknown schema kind '{other}'"),
            )),
        }
    }
}

/// Id and kind of the schema a draft item materializes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaRef {
    pub id: Identifier,
    pub kind: SchemaKind,
}

impl SchemaRef {
    pub fn new(id: Identifier, kind: SchemaKind) -> Self {
        Self { id, kind }
    }
}

/// A file produced for a draft item by a code template command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLink {
    /// Id of the automation that produced the file.
    pub command_id: Identifier,
    pub path: String,
}

/// The toolkit schemas resolve against, plus materialization settings.
#[derive(Debug, Clone, Copy)]
pub struct DraftContext<'a> {
    toolkit: &'a ToolkitDefinition,
    policy: DraftPolicy,
}

impl<'a> DraftContext<'a> {
    /// A context with the default [`DraftPolicy`].
    pub fn new(toolkit: &'a ToolkitDefinition) -> Self {
        Self {
            toolkit,
            policy: DraftPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: DraftPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn toolkit(&self) -> &'a ToolkitDefinition {
        self.toolkit
    }

    pub fn policy(&self) -> DraftPolicy {
        self.policy
    }
}

/// One node of a draft's runtime tree.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftItem {
    pub(crate) id: Identifier,
    pub(crate) name: String,
    pub(crate) schema: SchemaRef,
    pub(crate) value: Option<TypedValue>,
    pub(crate) properties: Option<IndexMap<String, DraftItem>>,
    pub(crate) items: Option<Vec<DraftItem>>,
    pub(crate) is_materialised: bool,
    pub(crate) artifact_links: Vec<ArtifactLink>,
    pub(crate) parent: Option<Identifier>,
}

impl DraftItem {
    fn placeholder(name: &str, schema: SchemaRef, parent: Option<Identifier>) -> Self {
        Self {
            id: Identifier::generate(),
            name: name.to_string(),
            schema,
            value: None,
            properties: None,
            items: None,
            is_materialised: false,
            artifact_links: Vec::new(),
            parent,
        }
    }

    /// Creates the root item of a draft, materialized from the toolkit's pattern.
    pub fn new_pattern(context: &DraftContext<'_>) -> Self {
        let schema = context.toolkit.resolve_pattern();
        let mut item = Self::placeholder(
            schema.name(),
            SchemaRef::new(schema.id().clone(), SchemaKind::Pattern),
            None,
        );
        item.properties = Some(build_properties(context, schema, &item.id));
        item.is_materialised = true;
        item
    }

    /// An attribute item holding the schema default, if any.
    pub(crate) fn attribute_item(schema: AttributeSchema<'_>, parent: &Identifier) -> Self {
        let mut item = Self::placeholder(
            schema.name(),
            SchemaRef::new(schema.id().clone(), SchemaKind::Attribute),
            Some(parent.clone()),
        );
        item.value = schema.default_value().cloned();
        item.is_materialised = item.value.is_some();
        item
    }

    /// An element or collection placeholder, created when the schema says so.
    pub(crate) fn element_item(
        context: &DraftContext<'_>,
        schema: ElementSchema<'_>,
        parent: &Identifier,
    ) -> Self {
        let kind = if schema.is_collection() {
            SchemaKind::EphemeralCollection
        } else {
            SchemaKind::Element
        };
        let mut item = Self::placeholder(
            schema.name(),
            SchemaRef::new(schema.id().clone(), kind),
            Some(parent.clone()),
        );
        if schema.should_auto_create() {
            item.materialise_element(context, schema, true);
        }
        item
    }

    fn new_collection_item(&self, context: &DraftContext<'_>, schema: ElementSchema<'_>) -> Self {
        let mut item = Self::placeholder(
            &self.name,
            SchemaRef::new(self.schema.id.clone(), SchemaKind::CollectionItem),
            self.parent.clone(),
        );
        item.properties = Some(build_properties(context, schema, &item.id));
        item.is_materialised = true;
        item
    }

    fn materialise_element(
        &mut self,
        context: &DraftContext<'_>,
        schema: ElementSchema<'_>,
        auto_created: bool,
    ) {
        if self.schema.kind == SchemaKind::EphemeralCollection {
            self.is_materialised = true;
            let needs_first_item = auto_created
                && context.policy.auto_create_collection_item
                && schema.cardinality() == Cardinality::OneOrMany
                && self.items.as_ref().is_none_or(Vec::is_empty);
            let first = needs_first_item.then(|| self.new_collection_item(context, schema));
            let items = self.items.get_or_insert_with(Vec::new);
            items.extend(first);
        } else {
            if self.properties.is_none() {
                self.properties = Some(build_properties(context, schema, &self.id));
            }
            self.is_materialised = true;
        }
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn kind(&self) -> SchemaKind {
        self.schema.kind
    }

    pub fn value(&self) -> Option<&TypedValue> {
        self.value.as_ref()
    }

    pub fn is_materialised(&self) -> bool {
        self.is_materialised
    }

    /// Properties of a materialized pattern, element or collection item.
    pub fn properties(&self) -> Option<&IndexMap<String, DraftItem>> {
        self.properties.as_ref()
    }

    /// Items of a materialized collection.
    pub fn items(&self) -> Option<&[DraftItem]> {
        self.items.as_deref()
    }

    pub fn artifact_links(&self) -> &[ArtifactLink] {
        &self.artifact_links
    }

    /// Id of the parent item. For collection items, the collection's parent.
    pub fn parent(&self) -> Option<&Identifier> {
        self.parent.as_ref()
    }

    fn invalid_kind(&self, operation: &str) -> ToolkitError {
        ToolkitError::InvalidSchemaKind {
            operation: operation.to_string(),
            kind: self.schema.kind.to_string(),
        }
    }

    fn ensure_kind(&self, operation: &str, allowed: &[SchemaKind]) -> Result<()> {
        if allowed.contains(&self.schema.kind) {
            Ok(())
        } else {
            Err(self.invalid_kind(operation))
        }
    }

    /// Returns the property called `name`.
    ///
    /// # Errors
    ///
    /// [`ToolkitError::NotMaterialised`] before materialization, or
    /// [`ToolkitError::NotFound`] when there is no such property.
    pub fn property(&self, name: &str) -> Result<&DraftItem> {
        let properties = self
            .properties
            .as_ref()
            .ok_or_else(|| ToolkitError::NotMaterialised(self.name.clone()))?;
        properties
            .get(name)
            .ok_or_else(|| ToolkitError::not_found("property", format!("{}.{name}", self.name)))
    }

    pub fn property_mut(&mut self, name: &str) -> Result<&mut DraftItem> {
        let item_name = self.name.clone();
        let properties = self
            .properties
            .as_mut()
            .ok_or_else(|| ToolkitError::NotMaterialised(item_name.clone()))?;
        properties
            .get_mut(name)
            .ok_or_else(|| ToolkitError::not_found("property", format!("{item_name}.{name}")))
    }

    /// Materializes this item.
    ///
    /// Elements and collection items get their properties, collections get an
    /// empty item list. Attributes take `value` when it converts to their data
    /// type, else their default; they count as materialized only when they end
    /// up with a value.
    ///
    /// # Errors
    ///
    /// [`ToolkitError::InvalidSchemaKind`] for the pattern item, which is
    /// always materialized, or [`ToolkitError::UnknownSchema`].
    pub fn materialise(&mut self, context: &DraftContext<'_>, value: Option<&str>) -> Result<()> {
        match self.schema.kind {
            SchemaKind::Pattern => Err(self.invalid_kind("materialise")),
            SchemaKind::Attribute => {
                let schema = context.toolkit.resolve_attribute(&self.schema.id)?;
                let data_type = schema.data_type();
                let explicit = value
                    .filter(|raw| is_valid_data_type(data_type, raw))
                    .and_then(|raw| set_value(data_type, raw).ok());
                self.value = explicit.or_else(|| schema.default_value().cloned());
                self.is_materialised = self.value.is_some();
                Ok(())
            }
            SchemaKind::Element | SchemaKind::EphemeralCollection | SchemaKind::CollectionItem => {
                let schema = context.toolkit.resolve_element(&self.schema.id)?;
                self.materialise_element(context, schema, false);
                Ok(())
            }
        }
    }

    /// Appends a new, materialized item to this collection.
    ///
    /// # Errors
    ///
    /// [`ToolkitError::InvalidSchemaKind`] unless this is a collection.
    pub fn materialise_collection_item(
        &mut self,
        context: &DraftContext<'_>,
    ) -> Result<&mut DraftItem> {
        self.ensure_kind(
            "materialise a collection item on",
            &[SchemaKind::EphemeralCollection],
        )?;
        let schema = context.toolkit.resolve_element(&self.schema.id)?;
        if !self.is_materialised {
            self.materialise_element(context, schema, false);
        }
        let item = self.new_collection_item(context, schema);
        let items = self.items.get_or_insert_with(Vec::new);
        let index = items.len();
        items.push(item);
        Ok(&mut items[index])
    }

    /// Drops this item's value, properties or items.
    ///
    /// # Errors
    ///
    /// [`ToolkitError::InvalidSchemaKind`] for the pattern item.
    pub fn unmaterialise(&mut self) -> Result<()> {
        if self.schema.kind == SchemaKind::Pattern {
            return Err(self.invalid_kind("unmaterialise"));
        }
        self.value = None;
        self.properties = None;
        self.items = None;
        self.is_materialised = false;
        Ok(())
    }

    /// Sets an attribute's value from its textual form; `None` clears it.
    ///
    /// Choices and the required flag are checked later by the validator.
    ///
    /// # Errors
    ///
    /// [`ToolkitError::InvalidSchemaKind`] unless this is an attribute, or
    /// [`ToolkitError::InvalidValue`] when `raw` does not convert.
    pub fn assign_value(&mut self, context: &DraftContext<'_>, raw: Option<&str>) -> Result<()> {
        self.ensure_kind("assign a value to", &[SchemaKind::Attribute])?;
        let schema = context.toolkit.resolve_attribute(&self.schema.id)?;
        self.value = raw
            .map(|raw| set_value(schema.data_type(), raw))
            .transpose()?;
        self.is_materialised = self.value.is_some();
        Ok(())
    }

    /// Records a file produced by `command_id`, replacing an earlier link.
    pub fn add_artifact_link(&mut self, command_id: &Identifier, path: impl Into<String>) {
        let path = path.into();
        match self
            .artifact_links
            .iter_mut()
            .find(|link| link.command_id == *command_id)
        {
            Some(link) => link.path = path,
            None => self.artifact_links.push(ArtifactLink {
                command_id: command_id.clone(),
                path,
            }),
        }
    }

    /// Child items: properties first, then collection items.
    pub fn children(&self) -> impl Iterator<Item = &DraftItem> {
        self.properties
            .iter()
            .flat_map(IndexMap::values)
            .chain(self.items.iter().flatten())
    }

    pub(crate) fn children_mut(&mut self) -> impl Iterator<Item = &mut DraftItem> {
        self.properties
            .iter_mut()
            .flat_map(IndexMap::values_mut)
            .chain(self.items.iter_mut().flatten())
    }

    /// Finds the item with `id` in this subtree.
    pub fn find_item(&self, id: &Identifier) -> Option<&DraftItem> {
        if self.id == *id {
            return Some(self);
        }
        self.children().find_map(|child| child.find_item(id))
    }

    pub fn find_item_mut(&mut self, id: &Identifier) -> Option<&mut DraftItem> {
        if self.id == *id {
            return Some(self);
        }
        self.children_mut().find_map(|child| child.find_item_mut(id))
    }

    fn path_segment(&self) -> String {
        if self.schema.kind == SchemaKind::CollectionItem {
            format!("{}.{}", self.name, self.id)
        } else {
            self.name.clone()
        }
    }

    /// Dotted path from `root` to this item, following parent links.
    pub fn fully_qualified_path(&self, root: &DraftItem) -> String {
        let mut segments = vec![self.path_segment()];
        let mut parent = self.parent.as_ref();
        while let Some(parent_id) = parent {
            let Some(item) = root.find_item(parent_id) else {
                break;
            };
            segments.push(item.path_segment());
            parent = item.parent.as_ref();
        }
        segments.reverse();
        segments.join(".")
    }

    /// The path wrapped in braces, as used by templates and automations.
    pub fn path_reference(&self, root: &DraftItem) -> String {
        format!("{{{}}}", self.fully_qualified_path(root))
    }

    /// Rebuilds parent links below this item.
    ///
    /// Parent links are not persisted; call this after rehydration and
    /// migration.
    pub fn populate_ancestry(&mut self) {
        let id = self.id.clone();
        let parent = self.parent.clone();
        if let Some(properties) = self.properties.as_mut() {
            for child in properties.values_mut() {
                child.parent = Some(id.clone());
                child.populate_ancestry();
            }
        }
        if let Some(items) = self.items.as_mut() {
            for item in items {
                item.parent = parent.clone();
                item.populate_ancestry();
            }
        }
    }

    /// Turns a single element into a collection, keeping a materialized
    /// element as the first item.
    pub(crate) fn convert_to_collection(&mut self) {
        self.schema.kind = SchemaKind::EphemeralCollection;
        let properties = self.properties.take();
        if !self.is_materialised {
            self.items = None;
            return;
        }
        let mut item = Self::placeholder(
            &self.name,
            SchemaRef::new(self.schema.id.clone(), SchemaKind::CollectionItem),
            self.parent.clone(),
        );
        item.properties = properties;
        item.is_materialised = true;
        item.artifact_links = std::mem::take(&mut self.artifact_links);
        self.items = Some(vec![item]);
    }

    /// Turns a collection into a single element, keeping its first item.
    pub(crate) fn convert_to_element(&mut self) {
        self.schema.kind = SchemaKind::Element;
        let first = self.items.take().and_then(|items| items.into_iter().next());
        match first {
            Some(item) => {
                self.properties = item.properties;
                self.is_materialised = item.is_materialised;
                self.artifact_links = item.artifact_links;
            }
            None => {
                self.properties = None;
                self.is_materialised = false;
            }
        }
    }
}

fn build_properties(
    context: &DraftContext<'_>,
    schema: ElementSchema<'_>,
    owner: &Identifier,
) -> IndexMap<String, DraftItem> {
    let mut properties = IndexMap::new();
    for attribute in schema.attributes() {
        properties.insert(
            attribute.name().to_string(),
            DraftItem::attribute_item(attribute, owner),
        );
    }
    for element in schema.elements() {
        properties.insert(
            element.name().to_string(),
            DraftItem::element_item(context, element, owner),
        );
    }
    properties
}

impl Persistable for ArtifactLink {
    const TYPE_NAME: &'static str = "ArtifactLink";

    fn dehydrate(&self) -> PersistableProperties {
        let mut properties = PersistableProperties::for_type::<Self>();
        properties.set("CommandId", self.command_id.as_str());
        properties.set("Path", self.path.clone());
        properties
    }

    fn rehydrate(properties: &PersistableProperties, _: &PersistableFactory) -> Result<Self> {
        Ok(Self {
            command_id: properties.identifier("CommandId")?,
            path: properties.string("Path")?,
        })
    }
}

impl Persistable for DraftItem {
    const TYPE_NAME: &'static str = "DraftItem";

    fn dehydrate(&self) -> PersistableProperties {
        let mut properties = PersistableProperties::for_type::<Self>();
        properties.set("Id", self.id.as_str());
        properties.set("Name", self.name.clone());
        properties.set("SchemaId", self.schema.id.as_str());
        properties.set("SchemaKind", self.schema.kind.as_str());
        properties.set("IsMaterialised", self.is_materialised);
        properties.set_opt("DataType", self.value.as_ref().map(|v| v.data_type().as_str()));
        properties.set_opt("Value", self.value.as_ref().map(ToString::to_string));

        let children = self.properties.as_ref().map(|children| {
            let map: Map<String, Value> = children
                .iter()
                .map(|(name, child)| (name.clone(), child.dehydrate().into_value()))
                .collect();
            Value::Object(map)
        });
        properties.set_opt("Properties", children);
        match &self.items {
            Some(items) => properties.set_list("Items", items),
            None => properties.set("Items", Value::Null),
        }
        properties.set_list("ArtifactLinks", &self.artifact_links);
        properties
    }

    fn rehydrate(properties: &PersistableProperties, factory: &PersistableFactory) -> Result<Self> {
        let value = match (
            properties.opt_string("DataType")?,
            properties.opt_string("Value")?,
        ) {
            (Some(data_type), Some(raw)) => Some(set_value(data_type.parse::<DataType>()?, &raw)?),
            _ => None,
        };

        let children = match properties.get("Properties") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(
                map.iter()
                    .map(|(name, child)| Ok((name.clone(), factory.rehydrate(child.clone())?)))
                    .collect::<Result<IndexMap<String, DraftItem>>>()?,
            ),
            Some(_) => {
                return Err(ToolkitError::persistence(
                    Self::TYPE_NAME,
                    "'Properties' is not an object",
                ));
            }
        };
        let items = match properties.get("Items") {
            None | Some(Value::Null) => None,
            Some(_) => Some(properties.list("Items", factory)?),
        };

        Ok(Self {
            id: properties.identifier("Id")?,
            name: properties.string("Name")?,
            schema: SchemaRef::new(
                properties.identifier("SchemaId")?,
                properties.parse("SchemaKind")?,
            ),
            value,
            properties: children,
            items,
            is_materialised: properties.bool("IsMaterialised")?,
            artifact_links: properties.list("ArtifactLinks", factory)?,
            parent: None,
        })
    }
}
