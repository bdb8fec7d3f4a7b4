//! Draft validation against a toolkit.
//!
//! Validation never mutates and never fails: it collects
//! [`ValidationResult`]s for every cardinality or value problem so a caller
//! can inspect a whole draft at once.

use tracing::debug;

use pattern_toolkit_core::{ToolkitDefinition, ValidationResult, VisitFlow};

use crate::item::{DraftItem, SchemaKind};
use crate::visitor::{DraftItemVisitor, PathStack, walk};

/// Collects validation results for a draft item tree.
///
/// Element results are reported at the element's own path reference;
/// attribute results at the reference of the element that owns them.
///
/// # Examples
///
/// ```
/// use pattern_toolkit_core::{
///     DataType, NewAttribute, PatternDefinition, ToolkitDefinition, VersionInstruction,
///     VersioningPolicy,
/// };
/// use pattern_toolkit_draft::{DraftContext, DraftItem, SchemaValidator};
///
/// let mut pattern = PatternDefinition::new("Blog").unwrap();
/// pattern
///     .edit_root()
///     .add_attribute(NewAttribute::new("title", DataType::String).required())
///     .unwrap();
/// let (toolkit, _) = ToolkitDefinition::package(
///     &mut pattern,
///     &VersionInstruction::auto(),
///     &VersioningPolicy::default(),
///     Vec::new(),
/// )
/// .unwrap();
///
/// let model = DraftItem::new_pattern(&DraftContext::new(&toolkit));
/// let results = SchemaValidator::new(&toolkit).validate(&model);
///
/// assert_eq!(results.len(), 1);
/// assert_eq!(results[0].path_reference, "{Blog}");
/// ```
#[derive(Debug)]
pub struct SchemaValidator<'a> {
    toolkit: &'a ToolkitDefinition,
    path: PathStack,
    results: Vec<ValidationResult>,
}

impl<'a> SchemaValidator<'a> {
    pub fn new(toolkit: &'a ToolkitDefinition) -> Self {
        Self {
            toolkit,
            path: PathStack::default(),
            results: Vec::new(),
        }
    }

    /// Validates `model` and returns the results in traversal order.
    pub fn validate(mut self, model: &DraftItem) -> Vec<ValidationResult> {
        walk(model, &mut self);
        debug!(
            draft = %model.name(),
            results = self.results.len(),
            "validated draft"
        );
        self.results
    }

    fn validate_attribute(&mut self, item: &DraftItem) {
        // Attributes missing from the toolkit are left to migration.
        if let Some(schema) = self.toolkit.find_attribute(&item.schema().id) {
            let reference = self.path.parent_reference();
            self.results.extend(schema.validate(&reference, item.value()));
        }
    }

    fn validate_cardinality(&mut self, item: &DraftItem) -> VisitFlow {
        let Some(schema) = self.toolkit.find_element(&item.schema().id) else {
            return VisitFlow::Abort;
        };
        let instances = match item.kind() {
            SchemaKind::EphemeralCollection => item.items().map_or(0, <[DraftItem]>::len),
            _ => usize::from(item.is_materialised()),
        };

        let cardinality = schema.cardinality();
        if cardinality.requires_at_least_one() && instances == 0 {
            self.results.push(ValidationResult::new(
                self.path.reference(),
                format!("{} requires at least one instance", item.name()),
            ));
        }
        if !cardinality.allows_many() && instances > 1 {
            self.results.push(ValidationResult::new(
                self.path.reference(),
                format!("{} cannot have more than one instance", item.name()),
            ));
        }

        if item.is_materialised() {
            VisitFlow::Continue
        } else {
            VisitFlow::Abort
        }
    }
}

impl DraftItemVisitor for SchemaValidator<'_> {
    fn enter(&mut self, item: &DraftItem) -> VisitFlow {
        self.path.push(item);
        match item.kind() {
            SchemaKind::Attribute => {
                self.validate_attribute(item);
                VisitFlow::Continue
            }
            SchemaKind::Element | SchemaKind::EphemeralCollection => {
                self.validate_cardinality(item)
            }
            SchemaKind::Pattern | SchemaKind::CollectionItem => VisitFlow::Continue,
        }
    }

    fn exit(&mut self, _item: &DraftItem) -> VisitFlow {
        self.path.pop();
        VisitFlow::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::DraftContext;
    use pattern_toolkit_core::{
        Cardinality, DataType, NewAttribute, NewElement, PatternDefinition, VersionInstruction,
        VersioningPolicy,
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

    #[test]
    fn test_missing_single_element_is_reported() {
        let mut pattern = PatternDefinition::new("Blog").unwrap();
        pattern
            .edit_root()
            .add_element(NewElement::new("Settings"))
            .unwrap();
        let toolkit = package(&mut pattern);
        let context = DraftContext::new(&toolkit);
        let mut model = DraftItem::new_pattern(&context);

        let results = SchemaValidator::new(&toolkit).validate(&model);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path_reference, "{Blog.Settings}");
        assert_eq!(results[0].message, "Settings requires at least one instance");

        model
            .property_mut("Settings")
            .unwrap()
            .materialise(&context, None)
            .unwrap();
        assert!(SchemaValidator::new(&toolkit).validate(&model).is_empty());
    }

    #[test]
    fn test_attribute_results_use_owning_item_reference() {
        let mut pattern = PatternDefinition::new("Blog").unwrap();
        let post = pattern
            .edit_root()
            .add_element(NewElement::new("Post").with_cardinality(Cardinality::ZeroOrMany))
            .unwrap();
        pattern
            .edit(&post)
            .unwrap()
            .add_attribute(
                NewAttribute::new("status", DataType::String).with_choices(["draft", "live"]),
            )
            .unwrap();
        let toolkit = package(&mut pattern);
        let context = DraftContext::new(&toolkit);
        let mut model = DraftItem::new_pattern(&context);
        let item = model
            .property_mut("Post")
            .unwrap()
            .materialise_collection_item(&context)
            .unwrap();
        item.property_mut("status")
            .unwrap()
            .assign_value(&context, Some("archived"))
            .unwrap();
        let item_id = item.id().clone();

        let results = SchemaValidator::new(&toolkit).validate(&model);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path_reference, format!("{{Blog.Post.{item_id}}}"));
        assert_eq!(
            results[0].message,
            "Attribute 'status' value 'archived' is not one of the allowed choices"
        );
    }
}
