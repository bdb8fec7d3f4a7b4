//! The authored pattern tree.
//!
//! A [`PatternDefinition`] is the root [`PatternElement`] of a pattern plus its
//! [`PatternVersioningHistory`]. Each element owns ordered lists of
//! [`Attribute`]s, child [`Element`]s, [`CodeTemplate`]s and [`Automation`]s.
//! The tree is only changed through a [`PatternEditor`] obtained from
//! [`PatternDefinition::edit`], which records every change in the history.
//!
//! # Examples
//!
//! ```
//! use pattern_toolkit_core::{
//!     Cardinality, DataType, NewAttribute, NewElement, PatternDefinition,
//! };
//!
//! let mut pattern = PatternDefinition::new("Blog").unwrap();
//! let post = {
//!     let mut editor = pattern.edit_root();
//!     editor
//!         .add_attribute(NewAttribute::new("title", DataType::String).required())
//!         .unwrap();
//!     editor
//!         .add_element(NewElement::new("Post").with_cardinality(Cardinality::OneOrMany))
//!         .unwrap()
//! };
//!
//! assert_eq!(pattern.element_path(&post).as_deref(), Some("Blog.Post"));
//! assert_eq!(pattern.history().change_log().len(), 2);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::attribute::Attribute;
use crate::automation::{Automation, CodeTemplate};
use crate::config::VersioningPolicy;
use crate::editor::{LaunchReference, PatternEditor};
use crate::error::{Result, ToolkitError};
use crate::identifier::Identifier;
use crate::persistence::{Persistable, PersistableFactory, PersistableProperties};
use crate::validate::validate_name;
use crate::versioning::{
    ChangeSeverity, PatternVersioningHistory, VersionInstruction, VersionUpdateResult,
};
use crate::visitor::{PatternNode, PatternVisitor, VisitFlow, walk_pattern};

/// Allowed number of instances of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Cardinality {
    /// Exactly one instance.
    #[default]
    One,
    /// At most one instance.
    ZeroOrOne,
    /// At least one instance.
    OneOrMany,
    /// Any number of instances.
    ZeroOrMany,
}

impl Cardinality {
    /// Returns `true` for the cardinalities drafts hold as a collection.
    pub fn is_collection(&self) -> bool {
        matches!(self, Cardinality::OneOrMany | Cardinality::ZeroOrMany)
    }

    /// Returns `true` if at least one instance is required.
    pub fn requires_at_least_one(&self) -> bool {
        matches!(self, Cardinality::One | Cardinality::OneOrMany)
    }

    /// Returns `true` if more than one instance is allowed.
    pub fn allows_many(&self) -> bool {
        self.is_collection()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Cardinality::One => "One",
            Cardinality::ZeroOrOne => "ZeroOrOne",
            Cardinality::OneOrMany => "OneOrMany",
            Cardinality::ZeroOrMany => "ZeroOrMany",
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cardinality {
    type Err = ToolkitError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "One" => Ok(Cardinality::One),
            "ZeroOrOne" => Ok(Cardinality::ZeroOrOne),
            "OneOrMany" => Ok(Cardinality::OneOrMany),
            "ZeroOrMany" => Ok(Cardinality::ZeroOrMany),
            other => Err(ToolkitError::persistence(
                "Element",
                format!("unknown cardinality '{other}'"),
            )),
        }
    }
}

/// A composite node of the pattern tree.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternElement {
    pub(crate) id: Identifier,
    pub(crate) name: String,
    pub(crate) display_name: String,
    pub(crate) description: String,
    pub(crate) attributes: Vec<Attribute>,
    pub(crate) elements: Vec<Element>,
    pub(crate) code_templates: Vec<CodeTemplate>,
    pub(crate) automations: Vec<Automation>,
    pub(crate) parent: Option<Identifier>,
}

impl PatternElement {
    pub(crate) fn new(name: String, display_name: Option<String>, description: String) -> Self {
        Self {
            id: Identifier::generate(),
            display_name: display_name.unwrap_or_else(|| name.clone()),
            name,
            description,
            attributes: Vec::new(),
            elements: Vec::new(),
            code_templates: Vec::new(),
            automations: Vec::new(),
            parent: None,
        }
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn code_templates(&self) -> &[CodeTemplate] {
        &self.code_templates
    }

    pub fn automations(&self) -> &[Automation] {
        &self.automations
    }

    /// Id of the parent element; `None` for the pattern itself.
    pub fn parent(&self) -> Option<&Identifier> {
        self.parent.as_ref()
    }

    /// Returns the direct attribute with `id`.
    pub fn attribute(&self, id: &Identifier) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.id() == id)
    }

    /// Returns the direct child element with `id`.
    pub fn element(&self, id: &Identifier) -> Option<&Element> {
        self.elements.iter().find(|e| e.id() == id)
    }

    pub fn attribute_by_name(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    pub fn element_by_name(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.name() == name)
    }

    /// Finds an element with `id` anywhere below this one.
    pub fn find_element(&self, id: &Identifier) -> Option<&Element> {
        self.elements.iter().find_map(|child| {
            if child.id() == id {
                Some(child)
            } else {
                child.element.find_element(id)
            }
        })
    }

    /// Finds an attribute with `id` on this element or anywhere below it.
    pub fn find_attribute(&self, id: &Identifier) -> Option<&Attribute> {
        self.attribute(id).or_else(|| {
            self.elements
                .iter()
                .find_map(|child| child.element.find_attribute(id))
        })
    }

    /// Finds an automation with `id`, together with the element that owns it.
    pub fn find_automation(&self, id: &Identifier) -> Option<(&PatternElement, &Automation)> {
        match self.automations.iter().find(|a| a.id() == id) {
            Some(automation) => Some((self, automation)),
            None => self
                .elements
                .iter()
                .find_map(|child| child.element.find_automation(id)),
        }
    }

    /// Finds a code template with `id` on this element or anywhere below it.
    pub fn find_code_template(&self, id: &Identifier) -> Option<&CodeTemplate> {
        match self.code_templates.iter().find(|t| t.id() == id) {
            Some(template) => Some(template),
            None => self
                .elements
                .iter()
                .find_map(|child| child.element.find_code_template(id)),
        }
    }

    pub(crate) fn find_mut(&mut self, id: &Identifier) -> Option<&mut PatternElement> {
        if self.id == *id {
            return Some(self);
        }
        self.elements
            .iter_mut()
            .find_map(|child| child.element.find_mut(id))
    }

    fn collect_path<'a>(&'a self, id: &Identifier, path: &mut Vec<&'a str>) -> bool {
        path.push(&self.name);
        if self.id == *id {
            return true;
        }
        if self
            .elements
            .iter()
            .any(|child| child.element.collect_path(id, path))
        {
            return true;
        }
        path.pop();
        false
    }

    pub(crate) fn collect_automation_ids(&self, ids: &mut Vec<Identifier>) {
        ids.extend(self.automations.iter().map(|a| a.id().clone()));
        for child in &self.elements {
            child.element.collect_automation_ids(ids);
        }
    }

    fn collect_launch_references(&self, references: &mut Vec<LaunchReference>) {
        references.extend(self.automations.iter().flat_map(LaunchReference::of));
        for child in &self.elements {
            child.element.collect_launch_references(references);
        }
    }

    fn apply_ancestry(&mut self, parents: &HashMap<Identifier, Identifier>) {
        self.parent = parents.get(&self.id).cloned();
        for attribute in &mut self.attributes {
            attribute.set_parent(parents.get(attribute.id()).cloned());
        }
        for template in &mut self.code_templates {
            template.set_parent(parents.get(template.id()).cloned());
        }
        for automation in &mut self.automations {
            automation.set_parent(parents.get(automation.id()).cloned());
        }
        for child in &mut self.elements {
            child.element.apply_ancestry(parents);
        }
    }
}

/// Input for adding an [`Element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewElement {
    pub name: String,
    pub cardinality: Cardinality,
    pub auto_create: bool,
    pub display_name: Option<String>,
    pub description: String,
}

impl NewElement {
    /// A `One` element that is not auto-created.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cardinality: Cardinality::One,
            auto_create: false,
            display_name: None,
            description: String::new(),
        }
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    /// Creates the element automatically when its parent is materialized.
    pub fn auto_create(mut self) -> Self {
        self.auto_create = true;
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Partial update of an [`Element`]. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementUpdate {
    pub name: Option<String>,
    pub cardinality: Option<Cardinality>,
    pub auto_create: Option<bool>,
    pub display_name: Option<String>,
    pub description: Option<String>,
}

/// A child element: a [`PatternElement`] with a cardinality.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub(crate) element: PatternElement,
    pub(crate) cardinality: Cardinality,
    pub(crate) auto_create: bool,
}

impl Element {
    pub(crate) fn new(input: NewElement) -> Result<Self> {
        validate_name(&input.name)?;
        Ok(Self {
            element: PatternElement::new(input.name, input.display_name, input.description),
            cardinality: input.cardinality,
            auto_create: input.auto_create,
        })
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Derived from the cardinality.
    pub fn is_collection(&self) -> bool {
        self.cardinality.is_collection()
    }

    pub fn auto_create(&self) -> bool {
        self.auto_create
    }
}

impl Deref for Element {
    type Target = PatternElement;

    fn deref(&self) -> &PatternElement {
        &self.element
    }
}

/// The root of a pattern, with its versioning history.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternDefinition {
    pub(crate) element: PatternElement,
    pub(crate) history: PatternVersioningHistory,
}

impl PatternDefinition {
    /// Creates an empty pattern at version `0.0.0`.
    ///
    /// # Errors
    ///
    /// Fails for an invalid or reserved name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self {
            element: PatternElement::new(name, None, String::new()),
            history: PatternVersioningHistory::new(),
        })
    }

    pub fn history(&self) -> &PatternVersioningHistory {
        &self.history
    }

    pub fn version(&self) -> &Version {
        self.history.current()
    }

    /// Borrows the element with `element_id` for editing.
    ///
    /// # Errors
    ///
    /// Returns [`ToolkitError::NotFound`] if no element has that id.
    pub fn edit(&mut self, element_id: &Identifier) -> Result<PatternEditor<'_>> {
        let path = self
            .element_path(element_id)
            .ok_or_else(|| ToolkitError::not_found("element", element_id.as_str()))?;
        let mut automation_ids = Vec::new();
        self.element.collect_automation_ids(&mut automation_ids);
        let mut references = Vec::new();
        self.element.collect_launch_references(&mut references);

        let target = self
            .element
            .find_mut(element_id)
            .ok_or_else(|| ToolkitError::not_found("element", element_id.as_str()))?;
        Ok(PatternEditor::new(
            target,
            &mut self.history,
            path,
            automation_ids,
            references,
        ))
    }

    /// Borrows the pattern itself for editing.
    pub fn edit_root(&mut self) -> PatternEditor<'_> {
        let path = self.element.name.clone();
        let mut automation_ids = Vec::new();
        self.element.collect_automation_ids(&mut automation_ids);
        let mut references = Vec::new();
        self.element.collect_launch_references(&mut references);
        PatternEditor::new(
            &mut self.element,
            &mut self.history,
            path,
            automation_ids,
            references,
        )
    }

    /// Renames the pattern. Recorded as a breaking change.
    pub fn rename(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        validate_name(&name)?;
        if name == self.element.name {
            return Ok(());
        }
        let message = format!("Pattern '{}' renamed to '{name}'", self.element.name);
        self.element.name = name;
        self.history.register_change(ChangeSeverity::Breaking, message);
        Ok(())
    }

    pub fn set_display_name(&mut self, display_name: impl Into<String>) {
        let display_name = display_name.into();
        if display_name == self.element.display_name {
            return;
        }
        let message = format!(
            "Pattern '{}' display name changed to '{display_name}'",
            self.element.name
        );
        self.element.display_name = display_name;
        self.history
            .register_change(ChangeSeverity::NonBreaking, message);
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        let description = description.into();
        if description == self.element.description {
            return;
        }
        let message = format!("Pattern '{}' description changed", self.element.name);
        self.element.description = description;
        self.history
            .register_change(ChangeSeverity::NonBreaking, message);
    }

    /// Dotted path of names from the pattern to the element with `id`.
    pub fn element_path(&self, id: &Identifier) -> Option<String> {
        let mut path = Vec::new();
        self.element
            .collect_path(id, &mut path)
            .then(|| path.join("."))
    }

    /// Rebuilds the parent links of every node.
    ///
    /// Parent links are not persisted; call this after rehydration.
    pub fn populate_ancestry(&mut self) {
        let mut collector = AncestryCollector::default();
        walk_pattern(self, &mut collector);
        self.element.apply_ancestry(&collector.parents);
        debug!(pattern = %self.element.name, nodes = collector.parents.len(), "populated pattern ancestry");
    }

    /// Moves the pattern to a new version. See
    /// [`PatternVersioningHistory::update_version`].
    pub fn update_version(
        &mut self,
        instruction: &VersionInstruction,
        policy: &VersioningPolicy,
    ) -> Result<VersionUpdateResult> {
        self.history.update_version(instruction, policy)
    }

    /// Walks the tree with `visitor`.
    pub fn accept<V: PatternVisitor>(&self, visitor: &mut V) -> VisitFlow {
        walk_pattern(self, visitor)
    }
}

impl Deref for PatternDefinition {
    type Target = PatternElement;

    fn deref(&self) -> &PatternElement {
        &self.element
    }
}

/// Collects child-to-parent links with a stack of open composites.
#[derive(Default)]
struct AncestryCollector {
    stack: Vec<Identifier>,
    parents: HashMap<Identifier, Identifier>,
}

impl AncestryCollector {
    fn link(&mut self, child: &Identifier) {
        if let Some(parent) = self.stack.last() {
            self.parents.insert(child.clone(), parent.clone());
        }
    }
}

impl PatternVisitor for AncestryCollector {
    fn enter(&mut self, node: PatternNode<'_>) -> VisitFlow {
        self.link(node.id());
        if node.is_composite() {
            self.stack.push(node.id().clone());
        }
        VisitFlow::Continue
    }

    fn exit(&mut self, node: PatternNode<'_>) -> VisitFlow {
        if node.is_composite() {
            self.stack.pop();
        }
        VisitFlow::Continue
    }
}

fn dehydrate_composite(element: &PatternElement, properties: &mut PersistableProperties) {
    properties.set("Id", element.id.as_str());
    properties.set("Name", element.name.clone());
    properties.set("DisplayName", element.display_name.clone());
    properties.set("Description", element.description.clone());
    properties.set_list("CodeTemplates", &element.code_templates);
    properties.set_list("Automations", &element.automations);
    properties.set_list("Attributes", &element.attributes);
    properties.set_list("Elements", &element.elements);
}

fn rehydrate_composite(
    properties: &PersistableProperties,
    factory: &PersistableFactory,
) -> Result<PatternElement> {
    Ok(PatternElement {
        id: properties.identifier("Id")?,
        name: properties.string("Name")?,
        display_name: properties.string("DisplayName")?,
        description: properties.opt_string("Description")?.unwrap_or_default(),
        attributes: properties.list("Attributes", factory)?,
        elements: properties.list("Elements", factory)?,
        code_templates: properties.list("CodeTemplates", factory)?,
        automations: properties.list("Automations", factory)?,
        parent: None,
    })
}

impl Persistable for Element {
    const TYPE_NAME: &'static str = "Element";

    fn dehydrate(&self) -> PersistableProperties {
        let mut properties = PersistableProperties::for_type::<Self>();
        dehydrate_composite(&self.element, &mut properties);
        properties.set("Cardinality", self.cardinality.as_str());
        properties.set("AutoCreate", self.auto_create);
        properties
    }

    fn rehydrate(properties: &PersistableProperties, factory: &PersistableFactory) -> Result<Self> {
        Ok(Self {
            element: rehydrate_composite(properties, factory)?,
            cardinality: properties.parse("Cardinality")?,
            auto_create: properties.bool("AutoCreate")?,
        })
    }
}

impl Persistable for PatternDefinition {
    const TYPE_NAME: &'static str = "PatternDefinition";

    fn dehydrate(&self) -> PersistableProperties {
        let mut properties = PersistableProperties::for_type::<Self>();
        dehydrate_composite(&self.element, &mut properties);
        properties.set_child("History", &self.history);
        properties
    }

    /// Rehydrates the pattern and rebuilds its parent links.
    fn rehydrate(properties: &PersistableProperties, factory: &PersistableFactory) -> Result<Self> {
        let mut pattern = Self {
            element: rehydrate_composite(properties, factory)?,
            history: properties.child("History", factory)?,
        };
        pattern.populate_ancestry();
        Ok(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::NewAttribute;
    use crate::automation::AutomationKind;
    use crate::data_type::DataType;

    fn blog() -> (PatternDefinition, Identifier, Identifier) {
        let mut pattern = PatternDefinition::new("Blog").unwrap();
        let mut editor = pattern.edit_root();
        let title = editor
            .add_attribute(NewAttribute::new("title", DataType::String))
            .unwrap();
        let post = editor
            .add_element(NewElement::new("Post").with_cardinality(Cardinality::ZeroOrMany))
            .unwrap();
        (pattern, title, post)
    }

    #[test]
    fn test_cardinality_flags() {
        assert!(Cardinality::OneOrMany.is_collection());
        assert!(Cardinality::ZeroOrMany.allows_many());
        assert!(!Cardinality::ZeroOrOne.is_collection());
        assert!(Cardinality::One.requires_at_least_one());
        assert!(!Cardinality::ZeroOrMany.requires_at_least_one());
    }

    #[test]
    fn test_find_nested_nodes() {
        let (mut pattern, title, post) = blog();
        let body = pattern
            .edit(&post)
            .unwrap()
            .add_attribute(NewAttribute::new("body", DataType::String))
            .unwrap();

        assert_eq!(pattern.find_element(&post).unwrap().name(), "Post");
        assert_eq!(pattern.find_attribute(&title).unwrap().name(), "title");
        assert_eq!(pattern.find_attribute(&body).unwrap().name(), "body");
        assert_eq!(pattern.element_path(&post).as_deref(), Some("Blog.Post"));
        assert_eq!(pattern.element_path(&body), None);
    }

    #[test]
    fn test_edit_unknown_element_fails() {
        let (mut pattern, title, _) = blog();
        let err = pattern.edit(&title).err().unwrap();
        assert!(matches!(err, ToolkitError::NotFound { .. }));
    }

    #[test]
    fn test_rename_records_breaking_change_once() {
        let (mut pattern, _, _) = blog();
        let before = pattern.history().change_log().len();

        pattern.rename("Journal").unwrap();
        pattern.rename("Journal").unwrap();

        assert_eq!(pattern.history().change_log().len(), before + 1);
        assert_eq!(pattern.history().last_change(), ChangeSeverity::Breaking);
    }

    #[test]
    fn test_populate_ancestry_links_every_node() {
        let (mut pattern, title, post) = blog();
        pattern
            .edit(&post)
            .unwrap()
            .add_automation(
                "Build",
                AutomationKind::CliCommand {
                    application_name: "make".into(),
                    arguments: String::new(),
                },
            )
            .unwrap();

        pattern.populate_ancestry();

        let root_id = pattern.id().clone();
        let post_element = pattern.find_element(&post).unwrap();
        assert_eq!(post_element.parent(), Some(&root_id));
        assert_eq!(pattern.find_attribute(&title).unwrap().parent(), Some(&root_id));
        assert_eq!(post_element.automations()[0].parent(), Some(&post));
        assert_eq!(pattern.parent(), None);
    }

    #[test]
    fn test_pattern_dehydrate_rehydrate_restores_ancestry() {
        let (mut pattern, title, post) = blog();
        pattern.populate_ancestry();

        let value = pattern.dehydrate().into_value();
        assert!(value.get("Parent").is_none());

        let restored: PatternDefinition = PersistableFactory::new().rehydrate(value).unwrap();
        assert_eq!(restored, pattern);
        assert_eq!(
            restored.find_attribute(&title).unwrap().parent(),
            Some(restored.id())
        );
        assert_eq!(restored.find_element(&post).unwrap().cardinality(), Cardinality::ZeroOrMany);
    }
}
