//! Error type shared by the authoring tree, toolkits and drafts.
//!
//! Every guard in the workspace reports through [`ToolkitError`]. Value-level
//! problems (a missing required value, a value outside its choices) are not
//! errors; they are collected by the draft validator instead.

use thiserror::Error;

/// Errors raised by pattern authoring, versioning, toolkit and draft operations.
///
/// The `Display` impl renders a human-readable message for each condition.
#[derive(Debug, Error)]
pub enum ToolkitError {
    /// A name does not match the identifier grammar.
    #[error("'{0}' is not a valid name: names must start with a letter or underscore and contain only letters, digits and underscores (max 50 characters)")]
    InvalidIdentifier(String),

    /// A name collides with a reserved token.
    #[error("'{0}' is a reserved name and cannot be used")]
    ReservedName(String),

    /// Two attributes, elements or automations would share a name in one parent.
    #[error("an attribute, element or automation named '{name}' already exists on '{parent}'")]
    DuplicateName { name: String, parent: String },

    /// A data type name is not one of the supported data types.
    #[error("unsupported data type: {0}")]
    UnsupportedDataType(String),

    /// A raw value cannot be converted to the requested data type.
    #[error("value '{value}' is not a valid {data_type}")]
    InvalidValue { value: String, data_type: String },

    /// A default value does not parse as its data type or is not one of the choices.
    #[error("default value '{value}' for attribute '{attribute}' is invalid: {reason}")]
    InvalidDefaultValue {
        attribute: String,
        value: String,
        reason: String,
    },

    /// A choice does not parse as the attribute's data type.
    #[error("choice '{choice}' for attribute '{attribute}' is not a valid {data_type}")]
    ChoiceTypeMismatch {
        attribute: String,
        choice: String,
        data_type: String,
    },

    /// Properties or items were accessed before materialization.
    #[error("draft item '{0}' has not been materialised")]
    NotMaterialised(String),

    /// An operation was attempted on the wrong kind of draft item.
    #[error("cannot {operation} a draft item of kind {kind}")]
    InvalidSchemaKind { operation: String, kind: String },

    /// A schema id does not resolve against the given toolkit.
    #[error("no {kind} schema with id '{id}' exists in toolkit '{toolkit}'")]
    UnknownSchema {
        kind: String,
        id: String,
        toolkit: String,
    },

    /// An authoring or draft entity could not be found.
    #[error("{kind} '{id}' was not found")]
    NotFound { kind: String, id: String },

    /// A version instruction is neither `auto` nor a semantic version.
    #[error("version instruction '{0}' is not a valid semantic version")]
    VersionInstructionInvalid(String),

    /// An explicit version is lower than the current version.
    #[error("version {requested} is before the current version {current}")]
    VersionBeforeCurrent { requested: String, current: String },

    /// The zero version was requested explicitly.
    #[error("version 0.0.0 cannot be used as a toolkit version")]
    ZeroVersionRequested,

    /// An explicit version skips a breaking change without force.
    #[error("version {requested} is lower than {estimated}, which is required by these breaking changes:\n{changes}")]
    IllegalVersionBump {
        requested: String,
        estimated: String,
        changes: String,
    },

    /// A toolkit was produced by a newer, incompatible runtime.
    #[error("toolkit '{toolkit}' was built with runtime {toolkit_runtime}, which is incompatible with runtime {runtime}")]
    IncompatibleRuntime {
        toolkit: String,
        toolkit_runtime: String,
        runtime: String,
    },

    /// A draft cannot be upgraded to the given toolkit.
    #[error("cannot upgrade draft '{draft}': {reason}")]
    IllegalUpgrade { draft: String, reason: String },

    /// A deletion would leave an automation pointing at nothing.
    #[error("cannot delete {kind} '{name}': automation '{referrer}' still refers to it")]
    StillReferenced {
        kind: String,
        name: String,
        referrer: String,
    },

    /// A code template has no file contents in the toolkit.
    #[error("code template '{0}' has no file contents")]
    MissingCodeTemplateFile(String),

    /// A dehydrated property bag is missing a key or holds the wrong type.
    #[error("cannot rehydrate {entity}: {reason}")]
    Persistence { entity: String, reason: String },

    /// An automation could not be executed.
    #[error("automation '{automation}' failed: {reason}")]
    AutomationFailed { automation: String, reason: String },

    /// File I/O failure while loading or saving configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ToolkitError {
    /// Builds a [`ToolkitError::Persistence`] for `entity`.
    pub fn persistence(entity: &str, reason: impl Into<String>) -> Self {
        Self::Persistence {
            entity: entity.to_string(),
            reason: reason.into(),
        }
    }

    /// Builds a [`ToolkitError::NotFound`] for an entity of `kind`.
    pub fn not_found(kind: &str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            id: id.into(),
        }
    }
}

/// Convenience alias for results with [`ToolkitError`].
pub type Result<T> = std::result::Result<T, ToolkitError>;
