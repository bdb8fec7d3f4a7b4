//! Drafts: runtime instances of pattern toolkits.
//!
//! A [`Draft`] holds a tree of [`DraftItem`]s built from a
//! [`ToolkitDefinition`](pattern_toolkit_core::ToolkitDefinition). Items are
//! materialized lazily as the user configures the draft, checked by the
//! [`SchemaValidator`], carried forward to newer toolkit versions by the
//! [`SchemaMigrator`], and exposed to code templates through the lazy
//! [`DraftItemDictionary`].
//!
//! # Example
//!
//! ```
//! use pattern_toolkit_core::*;
//! use pattern_toolkit_draft::Draft;
//!
//! let mut pattern = PatternDefinition::new("Blog").unwrap();
//! let title = pattern
//!     .edit_root()
//!     .add_attribute(NewAttribute::new("title", DataType::String))
//!     .unwrap();
//! let (v1, _) = ToolkitDefinition::package(
//!     &mut pattern,
//!     &VersionInstruction::auto(),
//!     &VersioningPolicy::default(),
//!     Vec::new(),
//! )
//! .unwrap();
//!
//! let mut draft = Draft::new("MyBlog", v1, DraftPolicy::default()).unwrap();
//!
//! pattern.edit_root().delete_attribute(&title).unwrap();
//! let (v2, _) = ToolkitDefinition::package(
//!     &mut pattern,
//!     &VersionInstruction::auto(),
//!     &VersioningPolicy::default(),
//!     Vec::new(),
//! )
//! .unwrap();
//!
//! let result = draft.upgrade(&v2).unwrap();
//! assert_eq!(result.changes()[0].message, "Attribute 'Blog.title' deleted");
//! assert_eq!(draft.toolkit().version().to_string(), "1.0.0");
//! ```

mod dictionary;
mod draft;
mod execute;
mod item;
mod migrate;
mod validate;
mod visitor;

pub use dictionary::{DictionaryValue, DraftItemDictionary, ID_KEY, ITEMS_KEY, PARENT_KEY};
pub use draft::Draft;
pub use execute::{
    ApplicationExecutor, AutomationServices, CommandExecutionResult, DraftPathResolver,
    FilePathResolver, FileSystemWriter, TextTemplatingEngine, execute_automation,
};
pub use item::{ArtifactLink, DraftContext, DraftItem, SchemaKind, SchemaRef};
pub use migrate::{DraftUpgradeResult, MigrationChange, SchemaMigrator};
pub use validate::SchemaValidator;
pub use visitor::{DraftItemVisitor, DraftItemVisitorMut, walk, walk_mut};
