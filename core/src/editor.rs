//! Change-recording mutators for one element of a pattern.
//!
//! A [`PatternEditor`] borrows a single [`PatternElement`] together with the
//! pattern's [`PatternVersioningHistory`]. Every successful change appends one
//! ledger entry per changed field; writes that change nothing append nothing.
//!
//! | Change                                              | Severity      |
//! |-----------------------------------------------------|---------------|
//! | add attribute / element / code template / automation | NonBreaking  |
//! | default value, added choices, no longer required    | NonBreaking   |
//! | auto-create, display name, description              | NonBreaking   |
//! | automation configuration of the same type           | NonBreaking   |
//! | rename, data type, cardinality                      | Breaking      |
//! | removed choices, becoming required                  | Breaking      |
//! | any deletion, automation type change                | Breaking      |

use crate::attribute::{Attribute, AttributeUpdate, NewAttribute};
use crate::automation::{Automation, AutomationKind, AutomationUpdate, CodeTemplate};
use crate::data_type::TypedValue;
use crate::error::{Result, ToolkitError};
use crate::identifier::Identifier;
use crate::pattern::{Element, ElementUpdate, NewElement, PatternElement};
use crate::validate::{ensure_unique_name, validate_name};
use crate::versioning::{ChangeSeverity, PatternVersioningHistory};

/// A command referenced by a launch point somewhere in the pattern.
pub(crate) struct LaunchReference {
    launch_point: Identifier,
    name: String,
    command: Identifier,
}

impl LaunchReference {
    pub(crate) fn of(automation: &Automation) -> Vec<LaunchReference> {
        match automation.kind() {
            AutomationKind::CommandLaunchPoint { command_ids } => command_ids
                .iter()
                .map(|command| LaunchReference {
                    launch_point: automation.id().clone(),
                    name: automation.name().to_string(),
                    command: command.clone(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Mutators for one element, obtained from
/// [`PatternDefinition::edit`](crate::PatternDefinition::edit).
///
/// Deletions that would leave a launch point or a code template command
/// pointing at nothing fail with [`ToolkitError::StillReferenced`].
pub struct PatternEditor<'a> {
    target: &'a mut PatternElement,
    history: &'a mut PatternVersioningHistory,
    path: String,
    automation_ids: Vec<Identifier>,
    references: Vec<LaunchReference>,
}

impl<'a> PatternEditor<'a> {
    pub(crate) fn new(
        target: &'a mut PatternElement,
        history: &'a mut PatternVersioningHistory,
        path: String,
        automation_ids: Vec<Identifier>,
        references: Vec<LaunchReference>,
    ) -> Self {
        Self {
            target,
            history,
            path,
            automation_ids,
            references,
        }
    }

    /// The element being edited.
    pub fn element(&self) -> &PatternElement {
        &*self.target
    }

    /// Dotted path of the element being edited.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn record(&mut self, severity: ChangeSeverity, message: String) {
        self.history.register_change(severity, message);
    }

    fn ensure_member_name_free(&self, name: &str, except: Option<&Identifier>) -> Result<()> {
        let taken = self
            .target
            .attributes
            .iter()
            .filter(|a| Some(a.id()) != except)
            .map(Attribute::name)
            .chain(
                self.target
                    .elements
                    .iter()
                    .filter(|e| Some(e.id()) != except)
                    .map(|e| e.name()),
            );
        ensure_unique_name(name, &self.path, taken)
    }

    fn ensure_automation_name_free(&self, name: &str, except: Option<&Identifier>) -> Result<()> {
        let taken = self
            .target
            .automations
            .iter()
            .filter(|a| Some(a.id()) != except)
            .map(Automation::name);
        ensure_unique_name(name, &self.path, taken)
    }

    /// Fails if a launch point outside `doomed` refers to one of `doomed`.
    fn ensure_unreferenced(&self, kind: &str, name: &str, doomed: &[Identifier]) -> Result<()> {
        match self
            .references
            .iter()
            .find(|r| doomed.contains(&r.command) && !doomed.contains(&r.launch_point))
        {
            Some(reference) => Err(ToolkitError::StillReferenced {
                kind: kind.to_string(),
                name: name.to_string(),
                referrer: reference.name.clone(),
            }),
            None => Ok(()),
        }
    }

    fn forget_automations(&mut self, removed: &[Identifier]) {
        self.automation_ids.retain(|id| !removed.contains(id));
        self.references.retain(|r| !removed.contains(&r.launch_point));
    }

    fn attribute_index(&self, id: &Identifier) -> Result<usize> {
        self.target
            .attributes
            .iter()
            .position(|a| a.id() == id)
            .ok_or_else(|| ToolkitError::not_found("attribute", id.as_str()))
    }

    fn element_index(&self, id: &Identifier) -> Result<usize> {
        self.target
            .elements
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| ToolkitError::not_found("element", id.as_str()))
    }

    fn automation_index(&self, id: &Identifier) -> Result<usize> {
        self.target
            .automations
            .iter()
            .position(|a| a.id() == id)
            .ok_or_else(|| ToolkitError::not_found("automation", id.as_str()))
    }

    /// Adds an attribute and returns its id.
    ///
    /// # Errors
    ///
    /// Fails if the attribute is invalid, or its name is taken by another
    /// attribute or element of this element.
    pub fn add_attribute(&mut self, input: NewAttribute) -> Result<Identifier> {
        let mut attribute = Attribute::new(input)?;
        self.ensure_member_name_free(attribute.name(), None)?;
        attribute.set_parent(Some(self.target.id.clone()));

        let id = attribute.id().clone();
        let message = format!("Attribute '{}' added to '{}'", attribute.name(), self.path);
        self.target.attributes.push(attribute);
        self.record(ChangeSeverity::NonBreaking, message);
        Ok(id)
    }

    /// Updates an attribute, recording one entry per changed field.
    pub fn update_attribute(&mut self, id: &Identifier, update: AttributeUpdate) -> Result<()> {
        let index = self.attribute_index(id)?;
        if let Some(name) = &update.name {
            self.ensure_member_name_free(name, Some(id))?;
        }
        let previous = self.target.attributes[index].apply_update(&update)?;
        let current = self.target.attributes[index].clone();
        let path = self.path.clone();
        let name = previous.name();

        if current.name() != previous.name() {
            self.record(
                ChangeSeverity::Breaking,
                format!("Attribute '{name}' on '{path}' renamed to '{}'", current.name()),
            );
        }
        if current.data_type() != previous.data_type() {
            self.record(
                ChangeSeverity::Breaking,
                format!(
                    "Attribute '{name}' on '{path}' changed data type from {} to {}",
                    previous.data_type(),
                    current.data_type()
                ),
            );
        }
        if current.is_required() != previous.is_required() {
            let (severity, state) = if current.is_required() {
                (ChangeSeverity::Breaking, "is now required")
            } else {
                (ChangeSeverity::NonBreaking, "is no longer required")
            };
            self.record(severity, format!("Attribute '{name}' on '{path}' {state}"));
        }
        if current.choices() != previous.choices() {
            let removed = previous
                .choices()
                .iter()
                .any(|choice| !current.choices().contains(choice));
            let severity = if removed || previous.choices().is_empty() {
                ChangeSeverity::Breaking
            } else {
                ChangeSeverity::NonBreaking
            };
            self.record(severity, format!("Attribute '{name}' on '{path}' changed choices"));
        }
        if current.default_value() != previous.default_value() {
            let show = |value: Option<&TypedValue>| {
                value.map_or_else(|| "none".to_string(), ToString::to_string)
            };
            self.record(
                ChangeSeverity::NonBreaking,
                format!(
                    "Attribute '{name}' on '{path}' changed default value from '{}' to '{}'",
                    show(previous.default_value()),
                    show(current.default_value())
                ),
            );
        }
        Ok(())
    }

    /// Deletes an attribute.
    pub fn delete_attribute(&mut self, id: &Identifier) -> Result<()> {
        let index = self.attribute_index(id)?;
        let attribute = self.target.attributes.remove(index);
        let message = format!("Attribute '{}' deleted from '{}'", attribute.name(), self.path);
        self.record(ChangeSeverity::Breaking, message);
        Ok(())
    }

    /// Adds a child element and returns its id.
    pub fn add_element(&mut self, input: NewElement) -> Result<Identifier> {
        let mut element = Element::new(input)?;
        self.ensure_member_name_free(element.name(), None)?;
        element.element.parent = Some(self.target.id.clone());

        let id = element.id().clone();
        let message = format!(
            "Element '{}' ({}) added to '{}'",
            element.name(),
            element.cardinality(),
            self.path
        );
        self.target.elements.push(element);
        self.record(ChangeSeverity::NonBreaking, message);
        Ok(id)
    }

    /// Updates a child element, recording one entry per changed field.
    pub fn update_element(&mut self, id: &Identifier, update: ElementUpdate) -> Result<()> {
        let index = self.element_index(id)?;
        if let Some(name) = &update.name {
            validate_name(name)?;
            self.ensure_member_name_free(name, Some(id))?;
        }

        let path = self.path.clone();
        let mut changes = Vec::new();
        let element = &mut self.target.elements[index];
        let name = element.element.name.clone();

        if let Some(new_name) = update.name.filter(|n| *n != name) {
            changes.push((
                ChangeSeverity::Breaking,
                format!("Element '{name}' on '{path}' renamed to '{new_name}'"),
            ));
            element.element.name = new_name;
        }
        if let Some(cardinality) = update.cardinality.filter(|c| *c != element.cardinality) {
            changes.push((
                ChangeSeverity::Breaking,
                format!(
                    "Element '{name}' on '{path}' changed cardinality from {} to {cardinality}",
                    element.cardinality
                ),
            ));
            element.cardinality = cardinality;
        }
        if let Some(auto_create) = update.auto_create.filter(|a| *a != element.auto_create) {
            changes.push((
                ChangeSeverity::NonBreaking,
                format!("Element '{name}' on '{path}' changed auto-create to {auto_create}"),
            ));
            element.auto_create = auto_create;
        }
        if let Some(display_name) = update
            .display_name
            .filter(|d| *d != element.element.display_name)
        {
            changes.push((
                ChangeSeverity::NonBreaking,
                format!("Element '{name}' on '{path}' display name changed to '{display_name}'"),
            ));
            element.element.display_name = display_name;
        }
        if let Some(description) = update
            .description
            .filter(|d| *d != element.element.description)
        {
            changes.push((
                ChangeSeverity::NonBreaking,
                format!("Element '{name}' on '{path}' description changed"),
            ));
            element.element.description = description;
        }

        for (severity, message) in changes {
            self.record(severity, message);
        }
        Ok(())
    }

    /// Deletes a child element with everything below it.
    ///
    /// # Errors
    ///
    /// Fails if a launch point outside the element refers to one of its
    /// automations.
    pub fn delete_element(&mut self, id: &Identifier) -> Result<()> {
        let index = self.element_index(id)?;
        let mut removed = Vec::new();
        let element = &self.target.elements[index];
        element.element.collect_automation_ids(&mut removed);
        self.ensure_unreferenced("element", element.name(), &removed)?;

        let element = self.target.elements.remove(index);
        self.forget_automations(&removed);
        let message = format!("Element '{}' deleted from '{}'", element.name(), self.path);
        self.record(ChangeSeverity::Breaking, message);
        Ok(())
    }

    /// Adds a code template and returns its id.
    pub fn add_code_template(
        &mut self,
        name: impl Into<String>,
        original_file_path: impl Into<String>,
    ) -> Result<Identifier> {
        let mut template = CodeTemplate::new(name, original_file_path)?;
        let taken = self.target.code_templates.iter().map(CodeTemplate::name);
        ensure_unique_name(template.name(), &self.path, taken)?;
        template.set_parent(Some(self.target.id.clone()));

        let id = template.id().clone();
        let message = format!("Code template '{}' added to '{}'", template.name(), self.path);
        self.target.code_templates.push(template);
        self.record(ChangeSeverity::NonBreaking, message);
        Ok(id)
    }

    /// Deletes a code template.
    ///
    /// # Errors
    ///
    /// Fails if a code template command of this element still uses it.
    pub fn delete_code_template(&mut self, id: &Identifier) -> Result<()> {
        let index = self
            .target
            .code_templates
            .iter()
            .position(|t| t.id() == id)
            .ok_or_else(|| ToolkitError::not_found("code template", id.as_str()))?;
        let user = self.target.automations.iter().find(|a| {
            matches!(
                a.kind(),
                AutomationKind::CodeTemplateCommand { code_template_id, .. } if code_template_id == id
            )
        });
        if let Some(user) = user {
            return Err(ToolkitError::StillReferenced {
                kind: "code template".to_string(),
                name: self.target.code_templates[index].name().to_string(),
                referrer: user.name().to_string(),
            });
        }
        let template = self.target.code_templates.remove(index);
        let message = format!(
            "Code template '{}' deleted from '{}'",
            template.name(),
            self.path
        );
        self.record(ChangeSeverity::Breaking, message);
        Ok(())
    }

    fn check_references(&self, kind: &AutomationKind) -> Result<()> {
        match kind {
            AutomationKind::CodeTemplateCommand {
                code_template_id, ..
            } if !self
                .target
                .code_templates
                .iter()
                .any(|t| t.id() == code_template_id) =>
            {
                Err(ToolkitError::not_found(
                    "code template",
                    code_template_id.as_str(),
                ))
            }
            AutomationKind::CommandLaunchPoint { command_ids } => {
                match command_ids
                    .iter()
                    .find(|id| !self.automation_ids.contains(*id))
                {
                    Some(missing) => Err(ToolkitError::not_found("automation", missing.as_str())),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }

    /// Adds an automation and returns its id.
    ///
    /// Code template commands must reference a code template of this element;
    /// launch points must reference existing automations of the pattern.
    pub fn add_automation(
        &mut self,
        name: impl Into<String>,
        kind: AutomationKind,
    ) -> Result<Identifier> {
        let mut automation = Automation::new(name, kind)?;
        self.ensure_automation_name_free(automation.name(), None)?;
        self.check_references(automation.kind())?;
        automation.set_parent(Some(self.target.id.clone()));

        let id = automation.id().clone();
        let message = format!(
            "Automation '{}' ({}) added to '{}'",
            automation.name(),
            automation.automation_type(),
            self.path
        );
        self.references.extend(LaunchReference::of(&automation));
        self.target.automations.push(automation);
        self.automation_ids.push(id.clone());
        self.record(ChangeSeverity::NonBreaking, message);
        Ok(id)
    }

    /// Updates an automation, recording one entry per changed field.
    pub fn update_automation(&mut self, id: &Identifier, update: AutomationUpdate) -> Result<()> {
        let index = self.automation_index(id)?;
        if let Some(name) = &update.name {
            self.ensure_automation_name_free(name, Some(id))?;
        }
        if let Some(kind) = &update.kind {
            self.check_references(kind)?;
        }

        let previous = self.target.automations[index].apply_update(&update)?;
        let current = &self.target.automations[index];
        self.references.retain(|r| r.launch_point != *id);
        self.references.extend(LaunchReference::of(current));
        let path = self.path.clone();
        let name = previous.name().to_string();
        let mut changes = Vec::new();

        if current.name() != previous.name() {
            changes.push((
                ChangeSeverity::Breaking,
                format!("Automation '{name}' on '{path}' renamed to '{}'", current.name()),
            ));
        }
        if current.kind() != previous.kind() {
            let severity = if current.automation_type() == previous.automation_type() {
                ChangeSeverity::NonBreaking
            } else {
                ChangeSeverity::Breaking
            };
            changes.push((
                severity,
                format!("Automation '{name}' on '{path}' changed configuration"),
            ));
        }

        for (severity, message) in changes {
            self.record(severity, message);
        }
        Ok(())
    }

    /// Deletes an automation.
    ///
    /// # Errors
    ///
    /// Fails if another launch point still refers to it.
    pub fn delete_automation(&mut self, id: &Identifier) -> Result<()> {
        let index = self.automation_index(id)?;
        let removed = [id.clone()];
        self.ensure_unreferenced("automation", self.target.automations[index].name(), &removed)?;

        let automation = self.target.automations.remove(index);
        self.forget_automations(&removed);
        let message = format!(
            "Automation '{}' deleted from '{}'",
            automation.name(),
            self.path
        );
        self.record(ChangeSeverity::Breaking, message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::DataType;
    use crate::pattern::{Cardinality, PatternDefinition};

    fn blog() -> PatternDefinition {
        PatternDefinition::new("Blog").unwrap()
    }

    fn log_len(pattern: &PatternDefinition) -> usize {
        pattern.history().change_log().len()
    }

    #[test]
    fn test_attribute_and_element_share_namespace() {
        let mut pattern = blog();
        let mut editor = pattern.edit_root();
        editor
            .add_attribute(NewAttribute::new("Post", DataType::String))
            .unwrap();
        let err = editor.add_element(NewElement::new("Post")).unwrap_err();
        assert!(matches!(err, ToolkitError::DuplicateName { .. }));
    }

    #[test]
    fn test_add_attribute_records_non_breaking_change() {
        let mut pattern = blog();
        pattern
            .edit_root()
            .add_attribute(NewAttribute::new("title", DataType::String))
            .unwrap();

        let log = pattern.history().change_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].severity, ChangeSeverity::NonBreaking);
        assert_eq!(log[0].message, "Attribute 'title' added to 'Blog'");
    }

    #[test]
    fn test_no_op_update_records_nothing() {
        let mut pattern = blog();
        let id = pattern
            .edit_root()
            .add_attribute(NewAttribute::new("title", DataType::String))
            .unwrap();
        let before = log_len(&pattern);

        pattern
            .edit_root()
            .update_attribute(
                &id,
                AttributeUpdate {
                    name: Some("title".into()),
                    data_type: Some(DataType::String),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(log_len(&pattern), before);
    }

    #[test]
    fn test_update_attribute_records_each_changed_field() {
        let mut pattern = blog();
        let id = pattern
            .edit_root()
            .add_attribute(NewAttribute::new("count", DataType::String).with_default("1"))
            .unwrap();
        let before = log_len(&pattern);

        pattern
            .edit_root()
            .update_attribute(
                &id,
                AttributeUpdate {
                    name: Some("total".into()),
                    data_type: Some(DataType::Int),
                    ..Default::default()
                },
            )
            .unwrap();

        let log = &pattern.history().change_log()[before..];
        assert_eq!(log.len(), 3);
        assert!(log[0].message.contains("renamed to 'total'"));
        assert!(log[1].message.contains("data type from string to int"));
        assert_eq!(log[2].severity, ChangeSeverity::NonBreaking);
        assert_eq!(
            pattern.attribute(&id).unwrap().default_value(),
            Some(&TypedValue::Int(1))
        );
    }

    #[test]
    fn test_choice_changes_are_classified() {
        let mut pattern = blog();
        let id = pattern
            .edit_root()
            .add_attribute(
                NewAttribute::new("status", DataType::String).with_choices(["draft", "live"]),
            )
            .unwrap();
        pattern
            .update_version(&crate::VersionInstruction::auto(), &Default::default())
            .unwrap();

        pattern
            .edit_root()
            .update_attribute(
                &id,
                AttributeUpdate {
                    choices: Some(vec!["draft".into(), "live".into(), "archived".into()]),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(pattern.history().last_change(), ChangeSeverity::NonBreaking);

        pattern
            .edit_root()
            .update_attribute(
                &id,
                AttributeUpdate {
                    choices: Some(vec!["draft".into()]),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(pattern.history().last_change(), ChangeSeverity::Breaking);
    }

    #[test]
    fn test_requiring_an_attribute_is_breaking() {
        let mut pattern = blog();
        let id = pattern
            .edit_root()
            .add_attribute(NewAttribute::new("title", DataType::String))
            .unwrap();
        pattern
            .update_version(&crate::VersionInstruction::auto(), &Default::default())
            .unwrap();

        pattern
            .edit_root()
            .update_attribute(
                &id,
                AttributeUpdate {
                    is_required: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(pattern.history().last_change(), ChangeSeverity::Breaking);
    }

    #[test]
    fn test_update_element_cardinality_is_breaking() {
        let mut pattern = blog();
        let post = pattern
            .edit_root()
            .add_element(NewElement::new("Post"))
            .unwrap();
        let before = log_len(&pattern);

        pattern
            .edit_root()
            .update_element(
                &post,
                ElementUpdate {
                    cardinality: Some(Cardinality::ZeroOrMany),
                    auto_create: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();

        let log = &pattern.history().change_log()[before..];
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].severity, ChangeSeverity::Breaking);
        assert!(pattern.find_element(&post).unwrap().is_collection());
    }

    #[test]
    fn test_code_template_command_requires_local_template() {
        let mut pattern = blog();
        let mut editor = pattern.edit_root();
        let err = editor
            .add_automation(
                "Generate",
                AutomationKind::CodeTemplateCommand {
                    code_template_id: Identifier::from_existing("missing"),
                    is_one_off: false,
                    file_path: "out.rs".into(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, ToolkitError::NotFound { .. }));

        let template = editor.add_code_template("Model", "model.rs.t").unwrap();
        editor
            .add_automation(
                "Generate",
                AutomationKind::CodeTemplateCommand {
                    code_template_id: template,
                    is_one_off: false,
                    file_path: "out.rs".into(),
                },
            )
            .unwrap();
    }

    #[test]
    fn test_launch_point_may_reference_automations_of_other_elements() {
        let mut pattern = blog();
        let post = pattern
            .edit_root()
            .add_element(NewElement::new("Post"))
            .unwrap();
        let build = pattern
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

        let mut editor = pattern.edit_root();
        editor
            .add_automation(
                "All",
                AutomationKind::CommandLaunchPoint {
                    command_ids: vec![build],
                },
            )
            .unwrap();
        let err = editor
            .add_automation(
                "Broken",
                AutomationKind::CommandLaunchPoint {
                    command_ids: vec![Identifier::from_existing("nope")],
                },
            )
            .unwrap_err();
        assert!(matches!(err, ToolkitError::NotFound { .. }));
    }

    #[test]
    fn test_referenced_automation_cannot_be_deleted() {
        let mut pattern = blog();
        let post = pattern
            .edit_root()
            .add_element(NewElement::new("Post"))
            .unwrap();
        let build = pattern
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
        let all = pattern
            .edit_root()
            .add_automation(
                "All",
                AutomationKind::CommandLaunchPoint {
                    command_ids: vec![build.clone()],
                },
            )
            .unwrap();
        let before = log_len(&pattern);

        let err = pattern
            .edit(&post)
            .unwrap()
            .delete_automation(&build)
            .unwrap_err();
        assert!(matches!(
            err,
            ToolkitError::StillReferenced { ref referrer, .. } if referrer == "All"
        ));
        let err = pattern.edit_root().delete_element(&post).unwrap_err();
        assert!(matches!(err, ToolkitError::StillReferenced { .. }));
        assert_eq!(log_len(&pattern), before);
        assert!(pattern.element_by_name("Post").is_some());

        {
            let mut editor = pattern.edit_root();
            editor.delete_automation(&all).unwrap();
            editor.delete_element(&post).unwrap();
        }
        assert!(pattern.automations().is_empty());
        assert!(pattern.element_by_name("Post").is_none());
    }

    #[test]
    fn test_launch_point_reference_follows_updates() {
        let mut pattern = blog();
        let mut editor = pattern.edit_root();
        let kind = AutomationKind::CliCommand {
            application_name: "make".into(),
            arguments: String::new(),
        };
        let build = editor.add_automation("Build", kind.clone()).unwrap();
        let test = editor.add_automation("Test", kind).unwrap();
        let all = editor
            .add_automation(
                "All",
                AutomationKind::CommandLaunchPoint {
                    command_ids: vec![build.clone()],
                },
            )
            .unwrap();
        editor
            .update_automation(
                &all,
                AutomationUpdate {
                    kind: Some(AutomationKind::CommandLaunchPoint {
                        command_ids: vec![test.clone()],
                    }),
                    ..AutomationUpdate::default()
                },
            )
            .unwrap();

        editor.delete_automation(&build).unwrap();
        let err = editor.delete_automation(&test).unwrap_err();
        assert!(matches!(err, ToolkitError::StillReferenced { .. }));
    }

    #[test]
    fn test_code_template_in_use_cannot_be_deleted() {
        let mut pattern = blog();
        let mut editor = pattern.edit_root();
        let template = editor.add_code_template("Model", "model.rs.t").unwrap();
        let generate = editor
            .add_automation(
                "Generate",
                AutomationKind::CodeTemplateCommand {
                    code_template_id: template.clone(),
                    is_one_off: false,
                    file_path: "out.rs".into(),
                },
            )
            .unwrap();

        let err = editor.delete_code_template(&template).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot delete code template 'Model': automation 'Generate' still refers to it"
        );

        editor.delete_automation(&generate).unwrap();
        editor.delete_code_template(&template).unwrap();
        assert!(editor.element().code_templates().is_empty());
    }

    #[test]
    fn test_automation_names_unique_per_element() {
        let mut pattern = blog();
        let mut editor = pattern.edit_root();
        let kind = AutomationKind::CliCommand {
            application_name: "make".into(),
            arguments: String::new(),
        };
        editor.add_automation("Build", kind.clone()).unwrap();
        let err = editor.add_automation("Build", kind).unwrap_err();
        assert!(matches!(err, ToolkitError::DuplicateName { .. }));
    }

    #[test]
    fn test_delete_records_breaking_change() {
        let mut pattern = blog();
        let title = pattern
            .edit_root()
            .add_attribute(NewAttribute::new("title", DataType::String))
            .unwrap();
        pattern.edit_root().delete_attribute(&title).unwrap();

        assert!(pattern.attributes().is_empty());
        assert_eq!(pattern.history().last_change(), ChangeSeverity::Breaking);
        let err = pattern.edit_root().delete_attribute(&title).unwrap_err();
        assert!(matches!(err, ToolkitError::NotFound { .. }));
    }
}
