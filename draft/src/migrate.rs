//! Structural migration of a draft to a newer toolkit.
//!
//! [`SchemaMigrator`] walks a draft item tree once, resolving every item's
//! schema id against the latest toolkit and comparing it with the toolkit the
//! draft was built from. Changes found while entering an item are applied to
//! the item itself; deletions and renames of a property are queued on the
//! owning item and applied when that item is exited, together with any
//! attributes and elements the latest schema added.
//!
//! Migration never fails. Values that no longer fit their attribute fall back
//! to the new default, or to no value, and every adjustment is reported in
//! the [`DraftUpgradeResult`].

use std::fmt;

use tracing::{debug, info};

use pattern_toolkit_core::{
    AttributeSchema, ChangeSeverity, ElementSchema, Identifier, ToolkitDefinition, VisitFlow,
    is_valid_typed_value,
};

use crate::item::{DraftContext, DraftItem, SchemaKind};
use crate::visitor::{DraftItemVisitorMut, PathStack, walk_mut};

/// One adjustment made while migrating a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationChange {
    pub severity: ChangeSeverity,
    pub message: String,
}

impl fmt::Display for MigrationChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Outcome of a draft migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftUpgradeResult {
    is_success: bool,
    changes: Vec<MigrationChange>,
}

impl Default for DraftUpgradeResult {
    fn default() -> Self {
        Self {
            is_success: true,
            changes: Vec::new(),
        }
    }
}

impl DraftUpgradeResult {
    pub fn is_success(&self) -> bool {
        self.is_success
    }

    /// Changes in the order they were made.
    pub fn changes(&self) -> &[MigrationChange] {
        &self.changes
    }

    /// Highest severity among the changes.
    pub fn severity(&self) -> ChangeSeverity {
        self.changes
            .iter()
            .map(|change| change.severity)
            .max()
            .unwrap_or_default()
    }

    /// Marks the migration as failed, recording `message` as a breaking change.
    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.is_success = false;
        self.add(ChangeSeverity::Breaking, message.into());
    }

    fn add(&mut self, severity: ChangeSeverity, message: String) {
        debug!(severity = %severity, %message, "draft migration change");
        self.changes.push(MigrationChange { severity, message });
    }
}

/// Property changes queued for the item that owns them.
#[derive(Debug, Default)]
struct PendingChanges {
    deletions: Vec<Identifier>,
    renamed: bool,
    skip: bool,
}

/// Migrates a draft item tree from one toolkit version to another.
#[derive(Debug)]
pub struct SchemaMigrator<'a> {
    current: &'a ToolkitDefinition,
    latest: DraftContext<'a>,
    path: PathStack,
    pending: Vec<PendingChanges>,
    result: DraftUpgradeResult,
}

impl<'a> SchemaMigrator<'a> {
    /// `current` is the toolkit the draft was built from; `latest` resolves
    /// the schemas the draft is migrated to.
    pub fn new(current: &'a ToolkitDefinition, latest: DraftContext<'a>) -> Self {
        Self {
            current,
            latest,
            path: PathStack::default(),
            pending: Vec::new(),
            result: DraftUpgradeResult::default(),
        }
    }

    /// Migrates `model` in place and rebuilds its parent links.
    pub fn migrate(mut self, model: &mut DraftItem) -> DraftUpgradeResult {
        walk_mut(model, &mut self);
        model.populate_ancestry();
        info!(
            draft = %model.name(),
            from = %self.current.version(),
            to = %self.latest.toolkit().version(),
            changes = self.result.changes.len(),
            "migrated draft"
        );
        self.result
    }

    fn enqueue(&mut self) -> &mut PendingChanges {
        if self.pending.is_empty() {
            self.pending.push(PendingChanges::default());
        }
        let last = self.pending.len() - 1;
        &mut self.pending[last]
    }

    fn rename(&mut self, item: &mut DraftItem, kind: &str, name: &str) {
        self.result.add(
            ChangeSeverity::Breaking,
            format!("{kind} '{}' renamed to '{name}'", self.path.path()),
        );
        item.name = name.to_string();
        self.path.replace_top(name);
        self.enqueue().renamed = true;
    }

    fn enter_pattern(&mut self, item: &mut DraftItem) -> VisitFlow {
        let schema = self.latest.toolkit().resolve_pattern();
        if schema.name() != item.name() {
            self.result.add(
                ChangeSeverity::Breaking,
                format!("Pattern '{}' renamed to '{}'", item.name(), schema.name()),
            );
            item.name = schema.name().to_string();
            self.path.replace_top(schema.name());
        }
        self.pending.push(PendingChanges::default());
        VisitFlow::Continue
    }

    fn enter_element(&mut self, item: &mut DraftItem) -> VisitFlow {
        let Some(schema) = self.latest.toolkit().find_element(&item.schema().id) else {
            if item.is_materialised() {
                self.result.add(
                    ChangeSeverity::Breaking,
                    format!("Element '{}' deleted", self.path.path()),
                );
            }
            self.enqueue().deletions.push(item.id().clone());
            self.pending.push(PendingChanges {
                skip: true,
                ..PendingChanges::default()
            });
            return VisitFlow::Abort;
        };

        if schema.name() != item.name() {
            self.rename(item, "Element", schema.name());
        }

        let previous = self
            .current
            .find_element(&item.schema().id)
            .map(|current| current.cardinality());
        if let Some(previous) = previous {
            if previous != schema.cardinality() {
                self.result.add(
                    ChangeSeverity::Breaking,
                    format!(
                        "Element '{}' cardinality changed from {previous} to {}",
                        self.path.path(),
                        schema.cardinality()
                    ),
                );
            }
        }
        match (item.kind(), schema.is_collection()) {
            (SchemaKind::Element, true) => item.convert_to_collection(),
            (SchemaKind::EphemeralCollection, false) => item.convert_to_element(),
            _ => {}
        }

        self.pending.push(PendingChanges::default());
        VisitFlow::Continue
    }

    fn enter_collection_item(&mut self, item: &mut DraftItem) -> VisitFlow {
        match self.latest.toolkit().find_element(&item.schema().id) {
            Some(schema) => {
                item.name = schema.name().to_string();
                self.pending.push(PendingChanges::default());
                VisitFlow::Continue
            }
            None => {
                self.pending.push(PendingChanges {
                    skip: true,
                    ..PendingChanges::default()
                });
                VisitFlow::Abort
            }
        }
    }

    fn enter_attribute(&mut self, item: &mut DraftItem) {
        let Some(schema) = self.latest.toolkit().find_attribute(&item.schema().id) else {
            self.result.add(
                ChangeSeverity::Breaking,
                format!("Attribute '{}' deleted", self.path.path()),
            );
            self.enqueue().deletions.push(item.id().clone());
            return;
        };
        let previous = self.current.find_attribute(&item.schema().id);

        if schema.name() != item.name() {
            self.rename(item, "Attribute", schema.name());
        }
        self.migrate_data_type(item, schema, previous);
        if let Some(previous) = previous {
            self.migrate_choices(item, schema, previous);
            self.migrate_default(item, schema, previous);
        }
        item.is_materialised = item.value.is_some();
    }

    fn migrate_data_type(
        &mut self,
        item: &mut DraftItem,
        schema: AttributeSchema<'_>,
        previous: Option<AttributeSchema<'_>>,
    ) {
        let old = previous
            .map(|previous| previous.data_type())
            .or_else(|| item.value().map(|value| value.data_type()));
        let new = schema.data_type();
        let Some(old) = old.filter(|old| *old != new) else {
            return;
        };

        if let Some(value) = item.value() {
            if !is_valid_typed_value(new, value) {
                item.value = value
                    .retype(new)
                    .or_else(|| schema.default_value().cloned());
            }
        }
        self.result.add(
            ChangeSeverity::Breaking,
            format!(
                "Attribute '{}' data type changed from {old} to {new}",
                self.path.path()
            ),
        );
    }

    fn migrate_choices(
        &mut self,
        item: &mut DraftItem,
        schema: AttributeSchema<'_>,
        previous: AttributeSchema<'_>,
    ) {
        if previous.choices() == schema.choices() {
            return;
        }

        let widened = previous.has_choices()
            && previous
                .choices()
                .iter()
                .all(|choice| schema.choices().contains(choice));
        let still_valid = item.value().is_none_or(|value| schema.is_valid_value(value));
        if !still_valid {
            item.value = schema
                .default_value()
                .filter(|default| schema.is_valid_value(default))
                .cloned();
        }

        let severity = if widened && still_valid {
            ChangeSeverity::NonBreaking
        } else {
            ChangeSeverity::Breaking
        };
        self.result.add(
            severity,
            format!("Attribute '{}' choices changed", self.path.path()),
        );
    }

    fn migrate_default(
        &mut self,
        item: &mut DraftItem,
        schema: AttributeSchema<'_>,
        previous: AttributeSchema<'_>,
    ) {
        if previous.default_value() == schema.default_value() {
            return;
        }

        if item.value().is_none() || item.value() == previous.default_value() {
            item.value = schema.default_value().cloned();
        }
        self.result.add(
            ChangeSeverity::NonBreaking,
            format!("Attribute '{}' default value changed", self.path.path()),
        );
    }

    fn apply_pending(&mut self, item: &mut DraftItem, pending: PendingChanges) {
        let Some(properties) = item.properties.as_mut() else {
            return;
        };
        if !pending.deletions.is_empty() {
            properties.retain(|_, child| !pending.deletions.contains(child.id()));
        }
        if pending.renamed {
            let renamed = std::mem::take(properties);
            *properties = renamed
                .into_iter()
                .map(|(_, child)| (child.name.clone(), child))
                .collect();
        }
    }

    fn add_missing(&mut self, item: &mut DraftItem) {
        let toolkit = self.latest.toolkit();
        let Some(schema) = toolkit.find_element(&item.schema().id) else {
            return;
        };
        let owner = item.id().clone();
        let Some(properties) = item.properties.as_mut() else {
            return;
        };

        let added_attributes: Vec<AttributeSchema<'_>> = schema
            .attributes()
            .filter(|attribute| {
                !properties
                    .values()
                    .any(|child| child.schema().id == *attribute.id())
            })
            .collect();
        let added_elements: Vec<ElementSchema<'_>> = schema
            .elements()
            .filter(|element| {
                !properties
                    .values()
                    .any(|child| child.schema().id == *element.id())
            })
            .collect();

        for attribute in added_attributes {
            properties.insert(
                attribute.name().to_string(),
                DraftItem::attribute_item(attribute, &owner),
            );
            self.result.add(
                ChangeSeverity::NonBreaking,
                format!("Attribute '{}' added", self.path.child_path(attribute.name())),
            );
        }
        for element in added_elements {
            properties.insert(
                element.name().to_string(),
                DraftItem::element_item(&self.latest, element, &owner),
            );
            self.result.add(
                ChangeSeverity::NonBreaking,
                format!("Element '{}' added", self.path.child_path(element.name())),
            );
        }
    }
}

impl DraftItemVisitorMut for SchemaMigrator<'_> {
    fn enter(&mut self, item: &mut DraftItem) -> VisitFlow {
        self.path.push(item);
        match item.kind() {
            SchemaKind::Pattern => self.enter_pattern(item),
            SchemaKind::Element | SchemaKind::EphemeralCollection => self.enter_element(item),
            SchemaKind::CollectionItem => self.enter_collection_item(item),
            SchemaKind::Attribute => {
                self.enter_attribute(item);
                VisitFlow::Continue
            }
        }
    }

    fn exit(&mut self, item: &mut DraftItem) -> VisitFlow {
        if item.kind() != SchemaKind::Attribute {
            if let Some(pending) = self.pending.pop() {
                if !pending.skip {
                    self.apply_pending(item, pending);
                    self.add_missing(item);
                }
            }
        }
        self.path.pop();
        VisitFlow::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pattern_toolkit_core::{
        AttributeUpdate, Cardinality, DataType, NewAttribute, NewElement, PatternDefinition,
        TypedValue, VersionInstruction, VersioningPolicy,
    };

    fn package(pattern: &mut PatternDefinition) -> ToolkitDefinition {
        ToolkitDefinition::package(
            pattern,
            &VersionInstruction::auto(),
            &VersioningPolicy::default(),
            Vec::new(),
        )
        .unwrap()
        .0
    }

    fn migrate(
        current: &ToolkitDefinition,
        latest: &ToolkitDefinition,
        model: &mut DraftItem,
    ) -> DraftUpgradeResult {
        SchemaMigrator::new(current, DraftContext::new(latest)).migrate(model)
    }

    #[test]
    fn test_renamed_attribute_keeps_value_and_position() {
        let mut pattern = PatternDefinition::new("Blog").unwrap();
        let title = {
            let mut editor = pattern.edit_root();
            let title = editor
                .add_attribute(NewAttribute::new("title", DataType::String))
                .unwrap();
            editor
                .add_attribute(NewAttribute::new("slug", DataType::String))
                .unwrap();
            title
        };
        let v1 = package(&mut pattern);
        let context = DraftContext::new(&v1);
        let mut model = DraftItem::new_pattern(&context);
        model
            .property_mut("title")
            .unwrap()
            .assign_value(&context, Some("Hello"))
            .unwrap();

        pattern
            .edit_root()
            .update_attribute(
                &title,
                AttributeUpdate {
                    name: Some("headline".into()),
                    ..AttributeUpdate::default()
                },
            )
            .unwrap();
        let v2 = package(&mut pattern);

        let result = migrate(&v1, &v2, &mut model);
        assert_eq!(result.changes().len(), 1);
        assert_eq!(
            result.changes()[0].message,
            "Attribute 'Blog.title' renamed to 'headline'"
        );
        assert_eq!(result.severity(), ChangeSeverity::Breaking);

        let keys: Vec<_> = model.properties().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["headline", "slug"]);
        assert_eq!(
            model.property("headline").unwrap().value(),
            Some(&TypedValue::String("Hello".into()))
        );
    }

    #[test]
    fn test_data_type_change_resets_incompatible_value() {
        let mut pattern = PatternDefinition::new("Blog").unwrap();
        let views = pattern
            .edit_root()
            .add_attribute(NewAttribute::new("views", DataType::String))
            .unwrap();
        let v1 = package(&mut pattern);
        let context = DraftContext::new(&v1);
        let mut model = DraftItem::new_pattern(&context);
        model
            .property_mut("views")
            .unwrap()
            .assign_value(&context, Some("lots"))
            .unwrap();

        pattern
            .edit_root()
            .update_attribute(
                &views,
                AttributeUpdate {
                    data_type: Some(DataType::Int),
                    default_value: Some(Some("0".into())),
                    ..AttributeUpdate::default()
                },
            )
            .unwrap();
        let v2 = package(&mut pattern);

        let result = migrate(&v1, &v2, &mut model);
        let messages: Vec<_> = result.changes().iter().map(|c| c.message.as_str()).collect();
        assert!(messages.contains(&"Attribute 'Blog.views' data type changed from string to int"));
        assert_eq!(
            model.property("views").unwrap().value(),
            Some(&TypedValue::Int(0))
        );
    }

    #[test]
    fn test_widened_choices_are_non_breaking() {
        let mut pattern = PatternDefinition::new("Blog").unwrap();
        let status = pattern
            .edit_root()
            .add_attribute(
                NewAttribute::new("status", DataType::String)
                    .with_choices(["draft", "published"])
                    .with_default("draft"),
            )
            .unwrap();
        let v1 = package(&mut pattern);
        let mut model = DraftItem::new_pattern(&DraftContext::new(&v1));

        pattern
            .edit_root()
            .update_attribute(
                &status,
                AttributeUpdate {
                    choices: Some(vec!["draft".into(), "published".into(), "archived".into()]),
                    ..AttributeUpdate::default()
                },
            )
            .unwrap();
        let v2 = package(&mut pattern);

        let result = migrate(&v1, &v2, &mut model);
        assert_eq!(result.changes().len(), 1);
        assert_eq!(result.changes()[0].severity, ChangeSeverity::NonBreaking);
        assert_eq!(
            model.property("status").unwrap().value(),
            Some(&TypedValue::String("draft".into()))
        );
    }

    #[test]
    fn test_default_change_only_replaces_untouched_values() {
        let mut pattern = PatternDefinition::new("Blog").unwrap();
        let (theme, font) = {
            let mut editor = pattern.edit_root();
            let theme = editor
                .add_attribute(NewAttribute::new("theme", DataType::String).with_default("light"))
                .unwrap();
            let font = editor
                .add_attribute(NewAttribute::new("font", DataType::String).with_default("serif"))
                .unwrap();
            (theme, font)
        };
        let v1 = package(&mut pattern);
        let context = DraftContext::new(&v1);
        let mut model = DraftItem::new_pattern(&context);
        model
            .property_mut("font")
            .unwrap()
            .assign_value(&context, Some("mono"))
            .unwrap();

        {
            let mut editor = pattern.edit_root();
            for id in [&theme, &font] {
                editor
                    .update_attribute(
                        id,
                        AttributeUpdate {
                            default_value: Some(Some("new".into())),
                            ..AttributeUpdate::default()
                        },
                    )
                    .unwrap();
            }
        }
        let v2 = package(&mut pattern);

        let result = migrate(&v1, &v2, &mut model);
        assert_eq!(result.severity(), ChangeSeverity::NonBreaking);
        assert_eq!(
            model.property("theme").unwrap().value(),
            Some(&TypedValue::String("new".into()))
        );
        assert_eq!(
            model.property("font").unwrap().value(),
            Some(&TypedValue::String("mono".into()))
        );
    }

    #[test]
    fn test_element_becoming_collection_keeps_instance() {
        let mut pattern = PatternDefinition::new("Blog").unwrap();
        let post = pattern
            .edit_root()
            .add_element(NewElement::new("Post").auto_create())
            .unwrap();
        pattern
            .edit(&post)
            .unwrap()
            .add_attribute(NewAttribute::new("body", DataType::String))
            .unwrap();
        let v1 = package(&mut pattern);
        let context = DraftContext::new(&v1);
        let mut model = DraftItem::new_pattern(&context);
        let body = model
            .property("Post")
            .unwrap()
            .property("body")
            .unwrap()
            .id()
            .clone();

        pattern
            .edit_root()
            .update_element(
                &post,
                pattern_toolkit_core::ElementUpdate {
                    cardinality: Some(Cardinality::ZeroOrMany),
                    ..Default::default()
                },
            )
            .unwrap();
        let v2 = package(&mut pattern);

        let result = migrate(&v1, &v2, &mut model);
        assert_eq!(
            result.changes()[0].message,
            "Element 'Blog.Post' cardinality changed from One to ZeroOrMany"
        );
        let collection = model.property("Post").unwrap();
        assert_eq!(collection.kind(), SchemaKind::EphemeralCollection);
        let item = &collection.items().unwrap()[0];
        assert_eq!(item.property("body").unwrap().id(), &body);
        assert_eq!(
            model.find_item(&body).unwrap().parent(),
            Some(item.id())
        );
    }

    #[test]
    fn test_new_elements_are_added_on_exit() {
        let mut pattern = PatternDefinition::new("Blog").unwrap();
        let v1 = package(&mut pattern);
        let mut model = DraftItem::new_pattern(&DraftContext::new(&v1));

        pattern
            .edit_root()
            .add_element(NewElement::new("Settings").auto_create())
            .unwrap();
        let v2 = package(&mut pattern);

        let result = migrate(&v1, &v2, &mut model);
        assert_eq!(result.changes().len(), 1);
        assert_eq!(result.changes()[0].message, "Element 'Blog.Settings' added");
        assert!(model.property("Settings").unwrap().is_materialised());
    }

    #[test]
    fn test_mark_failed() {
        let mut result = DraftUpgradeResult::default();
        assert!(result.is_success());
        result.mark_failed("aborted by caller");
        assert!(!result.is_success());
        assert_eq!(result.severity(), ChangeSeverity::Breaking);
    }
}
