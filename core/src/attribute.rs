//! Attribute descriptors.
//!
//! An [`Attribute`] is a named, typed leaf of a pattern element: a data type,
//! a required flag, an optional default value and an optional set of allowed
//! choices. Attributes are created and changed only through the owning
//! element's [`PatternEditor`](crate::PatternEditor) so that every change is
//! recorded in the versioning history.
//!
//! # Examples
//!
//! ```
//! use pattern_toolkit_core::{Attribute, DataType, NewAttribute, TypedValue};
//!
//! let status = Attribute::new(
//!     NewAttribute::new("status", DataType::String)
//!         .with_choices(["draft", "published"])
//!         .with_default("draft"),
//! )
//! .unwrap();
//!
//! assert_eq!(status.default_value(), Some(&TypedValue::String("draft".into())));
//! assert!(status.is_choice(&TypedValue::String("published".into())));
//! ```

use crate::data_type::{DataType, TypedValue, set_value};
use crate::error::{Result, ToolkitError};
use crate::identifier::Identifier;
use crate::persistence::{Persistable, PersistableFactory, PersistableProperties};
use crate::validate::validate_name;

/// Input for creating an [`Attribute`].
///
/// Values are raw strings; they are converted with the attribute's data type
/// when the attribute is built.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttribute {
    /// Attribute name (identifier grammar, not reserved).
    pub name: String,
    /// Data type of the attribute's values.
    pub data_type: DataType,
    /// Whether drafts must supply a value.
    pub is_required: bool,
    /// Default value, in its textual form.
    pub default_value: Option<String>,
    /// Allowed values, in their textual form. Empty means unrestricted.
    pub choices: Vec<String>,
}

impl NewAttribute {
    /// Creates an optional attribute input with no default and no choices.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            is_required: false,
            default_value: None,
            choices: Vec::new(),
        }
    }

    /// Marks the attribute as required.
    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    /// Sets the default value.
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Sets the allowed choices.
    pub fn with_choices<S: Into<String>>(mut self, choices: impl IntoIterator<Item = S>) -> Self {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }
}

/// Partial update of an [`Attribute`]. `None` fields are left unchanged.
///
/// `default_value: Some(None)` clears the default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeUpdate {
    pub name: Option<String>,
    pub data_type: Option<DataType>,
    pub is_required: Option<bool>,
    pub default_value: Option<Option<String>>,
    pub choices: Option<Vec<String>>,
}

/// A named, typed leaf descriptor of a pattern element.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    id: Identifier,
    name: String,
    data_type: DataType,
    is_required: bool,
    default_value: Option<TypedValue>,
    choices: Vec<TypedValue>,
    parent: Option<Identifier>,
}

impl Attribute {
    /// Builds an attribute from its input, validating every invariant.
    ///
    /// # Errors
    ///
    /// - [`ToolkitError::InvalidIdentifier`] / [`ToolkitError::ReservedName`]
    ///   for a bad name.
    /// - [`ToolkitError::ChoiceTypeMismatch`] if a choice does not convert.
    /// - [`ToolkitError::InvalidDefaultValue`] if the default does not convert
    ///   or is not one of the choices.
    pub fn new(input: NewAttribute) -> Result<Self> {
        validate_name(&input.name)?;
        let choices = parse_choices(&input.name, input.data_type, &input.choices)?;
        let default_value = parse_default(
            &input.name,
            input.data_type,
            input.default_value.as_deref(),
            &choices,
        )?;

        Ok(Self {
            id: Identifier::generate(),
            name: input.name,
            data_type: input.data_type,
            is_required: input.is_required,
            default_value,
            choices,
            parent: None,
        })
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn is_required(&self) -> bool {
        self.is_required
    }

    pub fn default_value(&self) -> Option<&TypedValue> {
        self.default_value.as_ref()
    }

    pub fn choices(&self) -> &[TypedValue] {
        &self.choices
    }

    /// Id of the owning element, once ancestry has been populated.
    pub fn parent(&self) -> Option<&Identifier> {
        self.parent.as_ref()
    }

    /// Returns `true` if `value` is allowed by the choices.
    ///
    /// Every value is allowed when there are no choices.
    pub fn is_choice(&self, value: &TypedValue) -> bool {
        self.choices.is_empty() || self.choices.contains(value)
    }

    pub(crate) fn set_parent(&mut self, parent: Option<Identifier>) {
        self.parent = parent;
    }

    /// Applies `update`, returning a copy of the previous state.
    ///
    /// The update is validated as a whole before anything changes.
    pub(crate) fn apply_update(&mut self, update: &AttributeUpdate) -> Result<Attribute> {
        let name = update.name.clone().unwrap_or_else(|| self.name.clone());
        let data_type = update.data_type.unwrap_or(self.data_type);
        validate_name(&name)?;

        let choices = match &update.choices {
            Some(raw) => parse_choices(&name, data_type, raw)?,
            None if data_type != self.data_type => {
                let raw: Vec<String> = self.choices.iter().map(ToString::to_string).collect();
                parse_choices(&name, data_type, &raw)?
            }
            None => self.choices.clone(),
        };
        let default_raw = match &update.default_value {
            Some(value) => value.clone(),
            None => self.default_value.as_ref().map(ToString::to_string),
        };
        let default_value = parse_default(&name, data_type, default_raw.as_deref(), &choices)?;

        let previous = self.clone();
        self.name = name;
        self.data_type = data_type;
        self.is_required = update.is_required.unwrap_or(self.is_required);
        self.default_value = default_value;
        self.choices = choices;
        Ok(previous)
    }
}

fn parse_choices(attribute: &str, data_type: DataType, raw: &[String]) -> Result<Vec<TypedValue>> {
    raw.iter()
        .map(|choice| {
            set_value(data_type, choice).map_err(|_| ToolkitError::ChoiceTypeMismatch {
                attribute: attribute.to_string(),
                choice: choice.clone(),
                data_type: data_type.to_string(),
            })
        })
        .collect()
}

fn parse_default(
    attribute: &str,
    data_type: DataType,
    raw: Option<&str>,
    choices: &[TypedValue],
) -> Result<Option<TypedValue>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let invalid = |reason: String| ToolkitError::InvalidDefaultValue {
        attribute: attribute.to_string(),
        value: raw.to_string(),
        reason,
    };

    let value =
        set_value(data_type, raw).map_err(|_| invalid(format!("not a valid {data_type}")))?;
    if !choices.is_empty() && !choices.contains(&value) {
        return Err(invalid("not one of the choices".to_string()));
    }
    Ok(Some(value))
}

impl Persistable for Attribute {
    const TYPE_NAME: &'static str = "Attribute";

    fn dehydrate(&self) -> PersistableProperties {
        let mut properties = PersistableProperties::for_type::<Self>();
        properties.set("Id", self.id.as_str());
        properties.set("Name", self.name.clone());
        properties.set("DataType", self.data_type.as_str());
        properties.set("IsRequired", self.is_required);
        properties.set_opt("DefaultValue", self.default_value.as_ref().map(ToString::to_string));
        properties.set(
            "Choices",
            self.choices
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
        );
        properties
    }

    fn rehydrate(properties: &PersistableProperties, _: &PersistableFactory) -> Result<Self> {
        let name = properties.string("Name")?;
        let data_type: DataType = properties.parse("DataType")?;
        let choices = parse_choices(&name, data_type, &properties.strings("Choices")?)?;
        let default_value = parse_default(
            &name,
            data_type,
            properties.opt_string("DefaultValue")?.as_deref(),
            &choices,
        )?;

        Ok(Self {
            id: properties.identifier("Id")?,
            name,
            data_type,
            is_required: properties.bool("IsRequired")?,
            default_value,
            choices,
            parent: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_attribute_rejects_default_outside_choices() {
        let err = Attribute::new(
            NewAttribute::new("status", DataType::String)
                .with_choices(["draft", "published"])
                .with_default("archived"),
        )
        .unwrap_err();
        assert!(matches!(err, ToolkitError::InvalidDefaultValue { .. }));
    }

    #[test]
    fn test_new_attribute_rejects_mistyped_choice() {
        let err = Attribute::new(
            NewAttribute::new("count", DataType::Int).with_choices(["1", "two"]),
        )
        .unwrap_err();
        assert!(matches!(err, ToolkitError::ChoiceTypeMismatch { .. }));
    }

    #[test]
    fn test_new_attribute_rejects_mistyped_default() {
        let err =
            Attribute::new(NewAttribute::new("flag", DataType::Bool).with_default("yes")).unwrap_err();
        assert!(matches!(err, ToolkitError::InvalidDefaultValue { .. }));
    }

    #[test]
    fn test_apply_update_retypes_existing_choices() {
        let mut attribute =
            Attribute::new(NewAttribute::new("size", DataType::String).with_choices(["1", "2"]))
                .unwrap();
        let previous = attribute
            .apply_update(&AttributeUpdate {
                data_type: Some(DataType::Int),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(previous.data_type(), DataType::String);
        assert_eq!(attribute.choices(), &[TypedValue::Int(1), TypedValue::Int(2)]);
    }

    #[test]
    fn test_apply_update_is_atomic_on_failure() {
        let mut attribute =
            Attribute::new(NewAttribute::new("title", DataType::String).with_default("hello"))
                .unwrap();
        let result = attribute.apply_update(&AttributeUpdate {
            name: Some("renamed".into()),
            data_type: Some(DataType::Int),
            ..Default::default()
        });

        assert!(result.is_err());
        assert_eq!(attribute.name(), "title");
        assert_eq!(attribute.data_type(), DataType::String);
    }

    #[test]
    fn test_attribute_dehydrate_rehydrate() {
        let attribute = Attribute::new(
            NewAttribute::new("published", DataType::DateTime)
                .required()
                .with_default("2024-01-15"),
        )
        .unwrap();

        let value = attribute.dehydrate().into_value();
        let restored: Attribute = PersistableFactory::new().rehydrate(value).unwrap();
        assert_eq!(restored, attribute);
    }
}
