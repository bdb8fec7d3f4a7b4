//! Read-only schema views over a pattern tree.
//!
//! Drafts never touch the authoring types directly. They resolve schema ids
//! against a [`ToolkitDefinition`](crate::ToolkitDefinition) and read these
//! views instead. The pattern itself is viewed as an element of cardinality
//! [`Cardinality::One`] that is always created.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attribute::Attribute;
use crate::automation::{Automation, CodeTemplate};
use crate::data_type::{DataType, TypedValue, is_valid_typed_value};
use crate::identifier::Identifier;
use crate::pattern::{Cardinality, Element, PatternDefinition, PatternElement};

/// One problem found while validating a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Path reference of the offending draft item, e.g. `{Blog.Post}`.
    pub path_reference: String,
    pub message: String,
}

impl ValidationResult {
    pub fn new(path_reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path_reference: path_reference.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path_reference, self.message)
    }
}

/// View of a pattern or element.
#[derive(Debug, Clone, Copy)]
pub struct ElementSchema<'a> {
    element: &'a PatternElement,
    cardinality: Cardinality,
    auto_create: bool,
    is_pattern: bool,
}

impl<'a> ElementSchema<'a> {
    pub fn for_pattern(pattern: &'a PatternDefinition) -> Self {
        Self {
            element: &pattern.element,
            cardinality: Cardinality::One,
            auto_create: true,
            is_pattern: true,
        }
    }

    pub fn for_element(element: &'a Element) -> Self {
        Self {
            element: &element.element,
            cardinality: element.cardinality,
            auto_create: element.auto_create,
            is_pattern: false,
        }
    }

    pub fn id(&self) -> &'a Identifier {
        &self.element.id
    }

    pub fn name(&self) -> &'a str {
        &self.element.name
    }

    pub fn display_name(&self) -> &'a str {
        &self.element.display_name
    }

    pub fn description(&self) -> &'a str {
        &self.element.description
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn is_collection(&self) -> bool {
        self.cardinality.is_collection()
    }

    pub fn should_auto_create(&self) -> bool {
        self.auto_create
    }

    pub fn is_pattern(&self) -> bool {
        self.is_pattern
    }

    pub fn attributes(self) -> impl Iterator<Item = AttributeSchema<'a>> + 'a {
        self.element.attributes.iter().map(AttributeSchema::new)
    }

    pub fn elements(self) -> impl Iterator<Item = ElementSchema<'a>> + 'a {
        self.element.elements.iter().map(ElementSchema::for_element)
    }

    pub fn automations(self) -> impl Iterator<Item = AutomationSchema<'a>> + 'a {
        self.element.automations.iter().map(AutomationSchema::new)
    }

    pub fn code_templates(&self) -> &'a [CodeTemplate] {
        &self.element.code_templates
    }

    /// Direct attribute with `id`.
    pub fn attribute(&self, id: &Identifier) -> Option<AttributeSchema<'a>> {
        self.element.attribute(id).map(AttributeSchema::new)
    }

    /// Direct child element with `id`.
    pub fn element(&self, id: &Identifier) -> Option<ElementSchema<'a>> {
        self.element.element(id).map(ElementSchema::for_element)
    }

    pub fn automation(&self, id: &Identifier) -> Option<AutomationSchema<'a>> {
        self.element
            .automations
            .iter()
            .find(|a| a.id() == id)
            .map(AutomationSchema::new)
    }
}

/// View of an attribute.
#[derive(Debug, Clone, Copy)]
pub struct AttributeSchema<'a> {
    attribute: &'a Attribute,
}

impl<'a> AttributeSchema<'a> {
    pub fn new(attribute: &'a Attribute) -> Self {
        Self { attribute }
    }

    pub fn id(&self) -> &'a Identifier {
        self.attribute.id()
    }

    pub fn name(&self) -> &'a str {
        self.attribute.name()
    }

    pub fn data_type(&self) -> DataType {
        self.attribute.data_type()
    }

    pub fn is_required(&self) -> bool {
        self.attribute.is_required()
    }

    pub fn default_value(&self) -> Option<&'a TypedValue> {
        self.attribute.default_value()
    }

    pub fn choices(&self) -> &'a [TypedValue] {
        self.attribute.choices()
    }

    pub fn has_choices(&self) -> bool {
        !self.attribute.choices().is_empty()
    }

    pub fn is_choice(&self, value: &TypedValue) -> bool {
        self.attribute.is_choice(value)
    }

    /// Returns `true` if `value` has the right type and is one of the choices.
    pub fn is_valid_value(&self, value: &TypedValue) -> bool {
        is_valid_typed_value(self.data_type(), value) && self.is_choice(value)
    }

    /// Checks a value against the required flag, the data type and the choices.
    ///
    /// Results are reported at `path_reference`.
    ///
    /// # Examples
    ///
    /// ```
    /// use pattern_toolkit_core::{Attribute, AttributeSchema, DataType, NewAttribute};
    ///
    /// let title = Attribute::new(NewAttribute::new("title", DataType::String).required()).unwrap();
    /// let results = AttributeSchema::new(&title).validate("{Blog}", None);
    ///
    /// assert_eq!(results.len(), 1);
    /// assert_eq!(results[0].message, "Attribute 'title' requires a value");
    /// ```
    pub fn validate(&self, path_reference: &str, value: Option<&TypedValue>) -> Vec<ValidationResult> {
        let name = self.name();
        let Some(value) = value else {
            if self.is_required() {
                return vec![ValidationResult::new(
                    path_reference,
                    format!("Attribute '{name}' requires a value"),
                )];
            }
            return Vec::new();
        };

        if !is_valid_typed_value(self.data_type(), value) {
            return vec![ValidationResult::new(
                path_reference,
                format!(
                    "Attribute '{name}' value '{value}' is not a valid {}",
                    self.data_type()
                ),
            )];
        }
        if !self.is_choice(value) {
            return vec![ValidationResult::new(
                path_reference,
                format!("Attribute '{name}' value '{value}' is not one of the allowed choices"),
            )];
        }
        Vec::new()
    }
}

/// View of an automation.
#[derive(Debug, Clone, Copy)]
pub struct AutomationSchema<'a> {
    automation: &'a Automation,
}

impl<'a> AutomationSchema<'a> {
    pub fn new(automation: &'a Automation) -> Self {
        Self { automation }
    }

    pub fn id(&self) -> &'a Identifier {
        self.automation.id()
    }

    pub fn name(&self) -> &'a str {
        self.automation.name()
    }

    pub fn automation(&self) -> &'a Automation {
        self.automation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::NewAttribute;

    fn status() -> Attribute {
        Attribute::new(
            NewAttribute::new("status", DataType::String).with_choices(["draft", "published"]),
        )
        .unwrap()
    }

    #[test]
    fn test_validate_accepts_missing_optional_value() {
        let attribute = status();
        assert!(AttributeSchema::new(&attribute).validate("{Blog}", None).is_empty());
    }

    #[test]
    fn test_validate_reports_wrong_type() {
        let attribute = status();
        let results =
            AttributeSchema::new(&attribute).validate("{Blog}", Some(&TypedValue::Int(3)));
        assert_eq!(
            results,
            vec![ValidationResult::new(
                "{Blog}",
                "Attribute 'status' value '3' is not a valid string"
            )]
        );
    }

    #[test]
    fn test_validate_reports_value_outside_choices() {
        let attribute = status();
        let results = AttributeSchema::new(&attribute)
            .validate("{Blog}", Some(&TypedValue::String("archived".into())));
        assert_eq!(results.len(), 1);
        assert!(results[0].message.contains("allowed choices"));
    }

    #[test]
    fn test_pattern_schema_is_single_and_auto_created() {
        let pattern = PatternDefinition::new("Blog").unwrap();
        let schema = ElementSchema::for_pattern(&pattern);
        assert_eq!(schema.cardinality(), Cardinality::One);
        assert!(schema.should_auto_create());
        assert!(schema.is_pattern());
        assert_eq!(schema.name(), "Blog");
    }
}
