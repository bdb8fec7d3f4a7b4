//! Automations and code templates.
//!
//! An [`Automation`] is a named executable action attached to a pattern
//! element. Its configuration lives in one [`AutomationKind`] variant per
//! automation type, so the fields a type needs are always present.
//!
//! # Examples
//!
//! ```
//! use pattern_toolkit_core::{Automation, AutomationKind, AutomationType};
//!
//! let build = Automation::new(
//!     "Build",
//!     AutomationKind::CliCommand {
//!         application_name: "cargo".into(),
//!         arguments: "build --release".into(),
//!     },
//! )
//! .unwrap();
//! assert_eq!(build.automation_type(), AutomationType::CliCommand);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolkitError};
use crate::identifier::Identifier;
use crate::persistence::{Persistable, PersistableFactory, PersistableProperties};
use crate::validate::validate_name;

/// Separator used when launch-point command ids are dehydrated.
pub const COMMAND_ID_DELIMITER: char = ';';

/// The type of an automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AutomationType {
    /// Runs an external application.
    CliCommand,
    /// Renders a code template to a file.
    CodeTemplateCommand,
    /// Runs a list of other automations in order.
    CommandLaunchPoint,
}

impl AutomationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutomationType::CliCommand => "CliCommand",
            AutomationType::CodeTemplateCommand => "CodeTemplateCommand",
            AutomationType::CommandLaunchPoint => "CommandLaunchPoint",
        }
    }
}

impl fmt::Display for AutomationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AutomationType {
    type Err = ToolkitError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CliCommand" => Ok(AutomationType::CliCommand),
            "CodeTemplateCommand" => Ok(AutomationType::CodeTemplateCommand),
            "CommandLaunchPoint" => Ok(AutomationType::CommandLaunchPoint),
            other => Err(ToolkitError::persistence(
                "Automation",
                format!("unknown automation type '{other}'"),
            )),
        }
    }
}

/// Type-specific configuration of an automation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutomationKind {
    /// Runs `application_name` with `arguments`.
    ///
    /// Arguments may contain `{{...}}` expressions resolved against the draft
    /// item the command runs on.
    CliCommand {
        application_name: String,
        arguments: String,
    },
    /// Renders a code template of the same element to `file_path`.
    ///
    /// One-off commands write their file once and then leave it alone.
    CodeTemplateCommand {
        code_template_id: Identifier,
        is_one_off: bool,
        file_path: String,
    },
    /// Runs the referenced automations in order.
    CommandLaunchPoint { command_ids: Vec<Identifier> },
}

impl AutomationKind {
    pub fn automation_type(&self) -> AutomationType {
        match self {
            AutomationKind::CliCommand { .. } => AutomationType::CliCommand,
            AutomationKind::CodeTemplateCommand { .. } => AutomationType::CodeTemplateCommand,
            AutomationKind::CommandLaunchPoint { .. } => AutomationType::CommandLaunchPoint,
        }
    }

    fn validate(&self) -> Result<()> {
        let missing = |field: &str| ToolkitError::InvalidValue {
            value: String::new(),
            data_type: format!("{} {field}", self.automation_type()),
        };
        match self {
            AutomationKind::CliCommand {
                application_name, ..
            } if application_name.trim().is_empty() => Err(missing("application name")),
            AutomationKind::CodeTemplateCommand { file_path, .. } if file_path.trim().is_empty() => {
                Err(missing("file path"))
            }
            _ => Ok(()),
        }
    }
}

/// A named executable action attached to a pattern element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Automation {
    id: Identifier,
    name: String,
    kind: AutomationKind,
    parent: Option<Identifier>,
}

impl Automation {
    /// Creates an automation.
    ///
    /// # Errors
    ///
    /// Fails for an invalid or reserved name, or when a required field of
    /// `kind` is empty.
    pub fn new(name: impl Into<String>, kind: AutomationKind) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        kind.validate()?;
        Ok(Self {
            id: Identifier::generate(),
            name,
            kind,
            parent: None,
        })
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &AutomationKind {
        &self.kind
    }

    pub fn automation_type(&self) -> AutomationType {
        self.kind.automation_type()
    }

    /// Id of the owning element, once ancestry has been populated.
    pub fn parent(&self) -> Option<&Identifier> {
        self.parent.as_ref()
    }

    pub(crate) fn set_parent(&mut self, parent: Option<Identifier>) {
        self.parent = parent;
    }

    /// Applies a rename and/or new configuration, returning the previous state.
    pub(crate) fn apply_update(&mut self, update: &AutomationUpdate) -> Result<Automation> {
        if let Some(name) = &update.name {
            validate_name(name)?;
        }
        if let Some(kind) = &update.kind {
            kind.validate()?;
        }
        let previous = self.clone();
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(kind) = &update.kind {
            self.kind = kind.clone();
        }
        Ok(previous)
    }
}

/// Partial update of an [`Automation`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutomationUpdate {
    pub name: Option<String>,
    pub kind: Option<AutomationKind>,
}

impl Persistable for Automation {
    const TYPE_NAME: &'static str = "Automation";

    fn dehydrate(&self) -> PersistableProperties {
        let mut properties = PersistableProperties::for_type::<Self>();
        properties.set("Id", self.id.as_str());
        properties.set("Name", self.name.clone());
        properties.set("AutomationType", self.automation_type().as_str());

        let mut metadata = serde_json::Map::new();
        match &self.kind {
            AutomationKind::CliCommand {
                application_name,
                arguments,
            } => {
                metadata.insert("ApplicationName".into(), application_name.clone().into());
                metadata.insert("Arguments".into(), arguments.clone().into());
            }
            AutomationKind::CodeTemplateCommand {
                code_template_id,
                is_one_off,
                file_path,
            } => {
                metadata.insert("CodeTemplateId".into(), code_template_id.as_str().into());
                metadata.insert("IsOneOff".into(), (*is_one_off).into());
                metadata.insert("FilePath".into(), file_path.clone().into());
            }
            AutomationKind::CommandLaunchPoint { command_ids } => {
                let joined = command_ids
                    .iter()
                    .map(Identifier::as_str)
                    .collect::<Vec<_>>()
                    .join(&COMMAND_ID_DELIMITER.to_string());
                metadata.insert("CommandIds".into(), joined.into());
            }
        }
        properties.set("Metadata", serde_json::Value::Object(metadata));
        properties
    }

    fn rehydrate(properties: &PersistableProperties, _: &PersistableFactory) -> Result<Self> {
        let automation_type: AutomationType = properties.parse("AutomationType")?;
        let metadata = properties.get("Metadata").cloned().unwrap_or_default();
        let metadata = PersistableProperties::from_value(Self::TYPE_NAME, metadata)?;

        let kind = match automation_type {
            AutomationType::CliCommand => AutomationKind::CliCommand {
                application_name: metadata.string("ApplicationName")?,
                arguments: metadata.opt_string("Arguments")?.unwrap_or_default(),
            },
            AutomationType::CodeTemplateCommand => AutomationKind::CodeTemplateCommand {
                code_template_id: metadata.identifier("CodeTemplateId")?,
                is_one_off: metadata.bool("IsOneOff")?,
                file_path: metadata.string("FilePath")?,
            },
            AutomationType::CommandLaunchPoint => AutomationKind::CommandLaunchPoint {
                command_ids: metadata
                    .string("CommandIds")?
                    .split(COMMAND_ID_DELIMITER)
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(Identifier::from_existing)
                    .collect(),
            },
        };

        Ok(Self {
            id: properties.identifier("Id")?,
            name: properties.string("Name")?,
            kind,
            parent: None,
        })
    }
}

/// A named code template whose contents are packaged with the toolkit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeTemplate {
    id: Identifier,
    name: String,
    original_file_path: String,
    original_file_extension: String,
    parent: Option<Identifier>,
}

impl CodeTemplate {
    /// Creates a code template imported from `original_file_path`.
    pub fn new(name: impl Into<String>, original_file_path: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        let original_file_path = original_file_path.into();
        let original_file_extension = std::path::Path::new(&original_file_path)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_string();
        Ok(Self {
            id: Identifier::generate(),
            name,
            original_file_path,
            original_file_extension,
            parent: None,
        })
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn original_file_path(&self) -> &str {
        &self.original_file_path
    }

    pub fn original_file_extension(&self) -> &str {
        &self.original_file_extension
    }

    pub fn parent(&self) -> Option<&Identifier> {
        self.parent.as_ref()
    }

    pub(crate) fn set_parent(&mut self, parent: Option<Identifier>) {
        self.parent = parent;
    }
}

impl Persistable for CodeTemplate {
    const TYPE_NAME: &'static str = "CodeTemplate";

    fn dehydrate(&self) -> PersistableProperties {
        let mut properties = PersistableProperties::for_type::<Self>();
        properties.set("Id", self.id.as_str());
        properties.set("Name", self.name.clone());
        properties.set("OriginalFilePath", self.original_file_path.clone());
        properties.set("OriginalFileExtension", self.original_file_extension.clone());
        properties
    }

    fn rehydrate(properties: &PersistableProperties, _: &PersistableFactory) -> Result<Self> {
        Ok(Self {
            id: properties.identifier("Id")?,
            name: properties.string("Name")?,
            original_file_path: properties.string("OriginalFilePath")?,
            original_file_extension: properties.string("OriginalFileExtension")?,
            parent: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_command_requires_application() {
        let result = Automation::new(
            "Build",
            AutomationKind::CliCommand {
                application_name: " ".into(),
                arguments: String::new(),
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_launch_point_dehydrates_delimited_ids() {
        let a = Identifier::from_existing("aaaa");
        let b = Identifier::from_existing("bbbb");
        let launch = Automation::new(
            "All",
            AutomationKind::CommandLaunchPoint {
                command_ids: vec![a.clone(), b.clone()],
            },
        )
        .unwrap();

        let properties = launch.dehydrate();
        assert_eq!(
            properties.get("Metadata").unwrap()["CommandIds"],
            serde_json::json!("aaaa;bbbb")
        );

        let restored: Automation = PersistableFactory::new()
            .rehydrate(properties.into_value())
            .unwrap();
        assert_eq!(restored, launch);
    }

    #[test]
    fn test_code_template_command_round_trip() {
        let command = Automation::new(
            "Generate",
            AutomationKind::CodeTemplateCommand {
                code_template_id: Identifier::from_existing("tmpl"),
                is_one_off: true,
                file_path: "src/{{Name}}.rs".into(),
            },
        )
        .unwrap();
        let restored: Automation = PersistableFactory::new()
            .rehydrate(command.dehydrate().into_value())
            .unwrap();
        assert_eq!(restored, command);
    }

    #[test]
    fn test_code_template_records_extension() {
        let template = CodeTemplate::new("Controller", "templates/controller.rs.t4").unwrap();
        assert_eq!(template.original_file_extension(), "t4");
    }
}
