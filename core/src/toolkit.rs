//! Versioned toolkit snapshots.
//!
//! A [`ToolkitDefinition`] freezes a [`PatternDefinition`] at a version,
//! together with the contents of its code templates and the version of the
//! runtime that built it. Drafts are created from toolkits and migrated
//! between them.
//!
//! # Examples
//!
//! ```
//! use pattern_toolkit_core::{
//!     DataType, NewAttribute, PatternDefinition, ToolkitDefinition, VersionInstruction,
//!     VersioningPolicy,
//! };
//!
//! let mut pattern = PatternDefinition::new("Blog").unwrap();
//! pattern
//!     .edit_root()
//!     .add_attribute(NewAttribute::new("title", DataType::String))
//!     .unwrap();
//!
//! let (toolkit, result) = ToolkitDefinition::package(
//!     &mut pattern,
//!     &VersionInstruction::auto(),
//!     &VersioningPolicy::default(),
//!     Vec::new(),
//! )
//! .unwrap();
//!
//! assert_eq!(toolkit.version().to_string(), "0.1.0");
//! assert!(result.warning.is_none());
//! assert!(toolkit.find_attribute(pattern.attributes()[0].id()).is_some());
//! ```

use semver::Version;
use tracing::{debug, info};

use crate::automation::Automation;
use crate::config::VersioningPolicy;
use crate::error::{Result, ToolkitError};
use crate::identifier::Identifier;
use crate::pattern::{PatternDefinition, PatternElement};
use crate::persistence::{Persistable, PersistableFactory, PersistableProperties};
use crate::schema::{AttributeSchema, ElementSchema};
use crate::versioning::{VersionInstruction, VersionUpdateResult};

/// Version of the runtime building and reading toolkits.
pub fn runtime_version() -> Version {
    Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| Version::new(0, 0, 0))
}

/// Contents of one code template, packaged with the toolkit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeTemplateFile {
    /// Id of the [`CodeTemplate`](crate::CodeTemplate).
    pub id: Identifier,
    pub contents: Vec<u8>,
}

impl CodeTemplateFile {
    pub fn new(id: Identifier, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            contents: contents.into(),
        }
    }
}

/// An immutable, versioned snapshot of a pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolkitDefinition {
    id: Identifier,
    version: Version,
    runtime_version: Version,
    pattern: PatternDefinition,
    code_template_files: Vec<CodeTemplateFile>,
}

impl ToolkitDefinition {
    /// Bumps the pattern's version and snapshots it.
    ///
    /// Every code template of the pattern must have an entry in `files`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolkitError::MissingCodeTemplateFile`] before anything is
    /// changed, or any error of
    /// [`PatternVersioningHistory::update_version`](crate::PatternVersioningHistory::update_version).
    pub fn package(
        pattern: &mut PatternDefinition,
        instruction: &VersionInstruction,
        policy: &VersioningPolicy,
        files: Vec<CodeTemplateFile>,
    ) -> Result<(Self, VersionUpdateResult)> {
        let mut missing = Vec::new();
        collect_missing_files(pattern, &files, &mut missing);
        if let Some(name) = missing.into_iter().next() {
            return Err(ToolkitError::MissingCodeTemplateFile(name));
        }

        let result = pattern.update_version(instruction, policy)?;
        let mut snapshot = pattern.clone();
        snapshot.populate_ancestry();
        let toolkit = Self {
            id: pattern.id().clone(),
            version: result.version.clone(),
            runtime_version: runtime_version(),
            pattern: snapshot,
            code_template_files: files,
        };
        info!(toolkit = %toolkit.pattern.name(), version = %toolkit.version, "packaged toolkit");
        Ok((toolkit, result))
    }

    /// Same as the id of the packaged pattern.
    pub fn id(&self) -> &Identifier {
        &self.id
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn runtime_version(&self) -> &Version {
        &self.runtime_version
    }

    pub fn pattern(&self) -> &PatternDefinition {
        &self.pattern
    }

    pub fn code_template_files(&self) -> &[CodeTemplateFile] {
        &self.code_template_files
    }

    pub fn code_template_file(&self, id: &Identifier) -> Option<&CodeTemplateFile> {
        self.code_template_files.iter().find(|file| file.id == *id)
    }

    /// Schema of the pattern itself.
    pub fn resolve_pattern(&self) -> ElementSchema<'_> {
        ElementSchema::for_pattern(&self.pattern)
    }

    /// Element schema with `id`, or the pattern when `id` is the pattern's.
    pub fn find_element(&self, id: &Identifier) -> Option<ElementSchema<'_>> {
        if self.pattern.id() == id {
            return Some(self.resolve_pattern());
        }
        self.pattern.find_element(id).map(ElementSchema::for_element)
    }

    /// Like [`find_element`](Self::find_element), failing when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ToolkitError::UnknownSchema`].
    pub fn resolve_element(&self, id: &Identifier) -> Result<ElementSchema<'_>> {
        self.find_element(id)
            .ok_or_else(|| self.unknown_schema("element", id))
    }

    pub fn find_attribute(&self, id: &Identifier) -> Option<AttributeSchema<'_>> {
        self.pattern.find_attribute(id).map(AttributeSchema::new)
    }

    /// # Errors
    ///
    /// Returns [`ToolkitError::UnknownSchema`].
    pub fn resolve_attribute(&self, id: &Identifier) -> Result<AttributeSchema<'_>> {
        self.find_attribute(id)
            .ok_or_else(|| self.unknown_schema("attribute", id))
    }

    /// Automation with `id`, with the element that owns it.
    pub fn find_automation(&self, id: &Identifier) -> Option<(&PatternElement, &Automation)> {
        self.pattern.find_automation(id)
    }

    /// # Errors
    ///
    /// Returns [`ToolkitError::UnknownSchema`].
    pub fn resolve_automation(&self, id: &Identifier) -> Result<(&PatternElement, &Automation)> {
        self.find_automation(id)
            .ok_or_else(|| self.unknown_schema("automation", id))
    }

    fn unknown_schema(&self, kind: &str, id: &Identifier) -> ToolkitError {
        ToolkitError::UnknownSchema {
            kind: kind.to_string(),
            id: id.to_string(),
            toolkit: self.pattern.name().to_string(),
        }
    }

    /// Replaces the snapshot with the one from `latest`.
    pub fn migrate_pattern(&mut self, latest: &ToolkitDefinition) {
        debug!(from = %self.version, to = %latest.version, "migrating toolkit snapshot");
        self.version = latest.version.clone();
        self.runtime_version = latest.runtime_version.clone();
        self.pattern = latest.pattern.clone();
        self.code_template_files = latest.code_template_files.clone();
    }

    /// Fails when the toolkit was built by a newer major runtime than this one.
    pub fn verify_runtime(&self) -> Result<()> {
        self.verify_runtime_against(&runtime_version())
    }

    /// # Errors
    ///
    /// Returns [`ToolkitError::IncompatibleRuntime`] when the toolkit's runtime
    /// has a higher major version than `runtime`.
    pub fn verify_runtime_against(&self, runtime: &Version) -> Result<()> {
        if self.runtime_version.major > runtime.major {
            return Err(ToolkitError::IncompatibleRuntime {
                toolkit: self.pattern.name().to_string(),
                toolkit_runtime: self.runtime_version.to_string(),
                runtime: runtime.to_string(),
            });
        }
        Ok(())
    }
}

fn collect_missing_files(
    element: &PatternElement,
    files: &[CodeTemplateFile],
    missing: &mut Vec<String>,
) {
    for template in element.code_templates() {
        if !files.iter().any(|file| file.id == *template.id()) {
            missing.push(template.name().to_string());
        }
    }
    for child in element.elements() {
        collect_missing_files(child, files, missing);
    }
}

impl Persistable for CodeTemplateFile {
    const TYPE_NAME: &'static str = "CodeTemplateFile";

    fn dehydrate(&self) -> PersistableProperties {
        let mut properties = PersistableProperties::for_type::<Self>();
        properties.set("Id", self.id.as_str());
        properties.set("Contents", self.contents.clone());
        properties
    }

    fn rehydrate(properties: &PersistableProperties, _: &PersistableFactory) -> Result<Self> {
        let contents = properties
            .get("Contents")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .ok_or_else(|| ToolkitError::persistence(Self::TYPE_NAME, "'Contents' is not a byte list"))?;
        Ok(Self {
            id: properties.identifier("Id")?,
            contents,
        })
    }
}

impl Persistable for ToolkitDefinition {
    const TYPE_NAME: &'static str = "ToolkitDefinition";

    fn dehydrate(&self) -> PersistableProperties {
        let mut properties = PersistableProperties::for_type::<Self>();
        properties.set("Id", self.id.as_str());
        properties.set("Version", self.version.to_string());
        properties.set("RuntimeVersion", self.runtime_version.to_string());
        properties.set_child("Pattern", &self.pattern);
        properties.set_list("CodeTemplateFiles", &self.code_template_files);
        properties
    }

    fn rehydrate(properties: &PersistableProperties, factory: &PersistableFactory) -> Result<Self> {
        Ok(Self {
            id: properties.identifier("Id")?,
            version: properties.parse("Version")?,
            runtime_version: properties.parse("RuntimeVersion")?,
            pattern: properties.child("Pattern", factory)?,
            code_template_files: properties.list("CodeTemplateFiles", factory)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::NewAttribute;
    use crate::data_type::DataType;
    use crate::pattern::NewElement;

    fn package(pattern: &mut PatternDefinition, files: Vec<CodeTemplateFile>) -> Result<ToolkitDefinition> {
        ToolkitDefinition::package(
            pattern,
            &VersionInstruction::auto(),
            &VersioningPolicy::default(),
            files,
        )
        .map(|(toolkit, _)| toolkit)
    }

    #[test]
    fn test_package_requires_code_template_files() {
        let mut pattern = PatternDefinition::new("Blog").unwrap();
        let post = pattern
            .edit_root()
            .add_element(NewElement::new("Post"))
            .unwrap();
        let template = pattern
            .edit(&post)
            .unwrap()
            .add_code_template("Page", "page.html")
            .unwrap();

        let err = package(&mut pattern, Vec::new()).unwrap_err();
        assert!(matches!(err, ToolkitError::MissingCodeTemplateFile(name) if name == "Page"));
        assert_eq!(pattern.version(), &Version::new(0, 0, 0));

        let toolkit = package(&mut pattern, vec![CodeTemplateFile::new(template.clone(), "<h1/>")]).unwrap();
        assert_eq!(toolkit.code_template_file(&template).unwrap().contents, b"<h1/>");
    }

    #[test]
    fn test_resolve_reports_unknown_schema() {
        let mut pattern = PatternDefinition::new("Blog").unwrap();
        let toolkit = package(&mut pattern, Vec::new()).unwrap();

        assert!(toolkit.find_element(pattern.id()).unwrap().is_pattern());
        let err = toolkit
            .resolve_attribute(&Identifier::from_existing("missing"))
            .err()
            .unwrap();
        assert!(matches!(err, ToolkitError::UnknownSchema { .. }));
    }

    #[test]
    fn test_snapshot_is_independent_of_later_edits() {
        let mut pattern = PatternDefinition::new("Blog").unwrap();
        let toolkit = package(&mut pattern, Vec::new()).unwrap();
        let title = pattern
            .edit_root()
            .add_attribute(NewAttribute::new("title", DataType::String))
            .unwrap();

        assert!(toolkit.find_attribute(&title).is_none());
    }

    #[test]
    fn test_migrate_pattern_swaps_snapshot_and_version() {
        let mut pattern = PatternDefinition::new("Blog").unwrap();
        let mut toolkit = package(&mut pattern, Vec::new()).unwrap();
        let title = pattern
            .edit_root()
            .add_attribute(NewAttribute::new("title", DataType::String))
            .unwrap();
        let latest = package(&mut pattern, Vec::new()).unwrap();

        toolkit.migrate_pattern(&latest);
        assert_eq!(toolkit.version(), &Version::new(0, 2, 0));
        assert!(toolkit.find_attribute(&title).is_some());
    }

    #[test]
    fn test_newer_major_runtime_is_incompatible() {
        let mut pattern = PatternDefinition::new("Blog").unwrap();
        let toolkit = package(&mut pattern, Vec::new()).unwrap();
        assert!(toolkit.verify_runtime().is_ok());

        let older = Version::new(toolkit.runtime_version().major.saturating_sub(1), 0, 0);
        if older.major < toolkit.runtime_version().major {
            let err = toolkit.verify_runtime_against(&older).unwrap_err();
            assert!(matches!(err, ToolkitError::IncompatibleRuntime { .. }));
        }
        let newer = Version::new(toolkit.runtime_version().major + 1, 0, 0);
        assert!(toolkit.verify_runtime_against(&newer).is_ok());
    }

    #[test]
    fn test_toolkit_dehydrate_rehydrate() {
        let mut pattern = PatternDefinition::new("Blog").unwrap();
        let template = pattern
            .edit_root()
            .add_code_template("Readme", "README.md")
            .unwrap();
        let toolkit = package(&mut pattern, vec![CodeTemplateFile::new(template, "# Blog")]).unwrap();

        let restored: ToolkitDefinition = PersistableFactory::new()
            .rehydrate(toolkit.dehydrate().into_value())
            .unwrap();
        assert_eq!(restored, toolkit);
    }
}
