//! Pattern authoring, versioning and toolkit snapshots.
//!
//! This crate defines the authoring side of pattern toolkits:
//!
//! - [`PatternDefinition`]: the root of a pattern tree of [`Element`]s,
//!   [`Attribute`]s, [`CodeTemplate`]s and [`Automation`]s, edited through a
//!   change-recording [`PatternEditor`].
//! - [`PatternVersioningHistory`]: the change ledger that classifies each edit
//!   as breaking or non-breaking and computes the next semantic version.
//! - [`ToolkitDefinition`]: an immutable, versioned snapshot of a pattern,
//!   read through the [`ElementSchema`] and [`AttributeSchema`] views.
//! - [`Persistable`]: the dehydrate/rehydrate contract every entity follows.
//!
//! Drafts built from toolkits live in the `pattern-toolkit-draft` crate.
//!
//! # Example
//!
//! ```
//! use pattern_toolkit_core::*;
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
//! pattern
//!     .edit(&post)
//!     .unwrap()
//!     .add_attribute(NewAttribute::new("body", DataType::String))
//!     .unwrap();
//!
//! let (toolkit, _) = ToolkitDefinition::package(
//!     &mut pattern,
//!     &VersionInstruction::auto(),
//!     &VersioningPolicy::default(),
//!     Vec::new(),
//! )
//! .unwrap();
//!
//! assert_eq!(toolkit.version().to_string(), "0.1.0");
//! assert!(toolkit.resolve_element(&post).unwrap().is_collection());
//! ```

mod attribute;
mod automation;
mod config;
mod data_type;
mod editor;
mod error;
mod identifier;
mod pattern;
mod persistence;
mod schema;
mod toolkit;
mod validate;
mod versioning;
mod visitor;

pub use attribute::{Attribute, AttributeUpdate, NewAttribute};
pub use automation::{
    Automation, AutomationKind, AutomationType, AutomationUpdate, COMMAND_ID_DELIMITER,
    CodeTemplate,
};
pub use config::{DraftPolicy, ToolkitConfig, VersioningPolicy};
pub use data_type::{DataType, TypedValue, is_valid_data_type, is_valid_typed_value, set_value};
pub use editor::PatternEditor;
pub use error::{Result, ToolkitError};
pub use identifier::{IDENTIFIER_LENGTH, Identifier};
pub use pattern::{
    Cardinality, Element, ElementUpdate, NewElement, PatternDefinition, PatternElement,
};
pub use persistence::{Persistable, PersistableFactory, PersistableProperties, TYPE_KEY};
pub use schema::{AttributeSchema, AutomationSchema, ElementSchema, ValidationResult};
pub use toolkit::{CodeTemplateFile, ToolkitDefinition, runtime_version};
pub use validate::{
    RESERVED_NAMES, ensure_unique_name, is_reserved_name, is_valid_identifier, validate_name,
};
pub use versioning::{
    AUTO_VERSION, ChangeSeverity, PatternVersioningHistory, VersionChangeEntry,
    VersionInstruction, VersionUpdateResult,
};
pub use visitor::{PatternNode, PatternVisitor, VisitFlow, walk_pattern};

/// Re-exported so callers can name versions without a direct dependency.
pub use semver::Version;
