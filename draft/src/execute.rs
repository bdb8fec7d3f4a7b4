//! Running automations against draft items.
//!
//! The core decides what an automation does on a given item; the side
//! effects (spawning a process, resolving and writing files, rendering
//! templates) go through the collaborator traits bundled in
//! [`AutomationServices`], which hosts implement.

use tracing::{info, warn};

use pattern_toolkit_core::{Automation, AutomationKind, Identifier, Result, ToolkitError};

use crate::dictionary::DraftItemDictionary;
use crate::draft::Draft;
use crate::item::{DraftItem, SchemaKind};

/// Runs external applications for CLI commands.
pub trait ApplicationExecutor {
    /// Runs `application` with `arguments` and returns its output.
    fn run(&self, application: &str, arguments: &str) -> Result<String>;
}

/// Expands `{{...}}` expressions against a draft item.
pub trait DraftPathResolver {
    fn resolve(&self, expression: &str, item: &DraftItemDictionary<'_>) -> Result<String>;
}

/// Answers questions about the host's file system.
pub trait FilePathResolver {
    fn exists(&self, path: &str) -> bool;
}

/// Writes generated files.
pub trait FileSystemWriter {
    fn write(&self, path: &str, contents: &str) -> Result<()>;
}

/// Renders code template contents against a draft item.
pub trait TextTemplatingEngine {
    fn render(&self, template: &str, item: &DraftItemDictionary<'_>) -> Result<String>;
}

/// The host collaborators an automation may call.
#[derive(Clone, Copy)]
pub struct AutomationServices<'s> {
    pub executor: &'s dyn ApplicationExecutor,
    pub draft_paths: &'s dyn DraftPathResolver,
    pub files: &'s dyn FilePathResolver,
    pub writer: &'s dyn FileSystemWriter,
    pub templates: &'s dyn TextTemplatingEngine,
}

/// Outcome of running one automation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandExecutionResult {
    pub command_name: String,
    pub is_success: bool,
    /// One line per step; launch points include the lines of every command.
    pub log: Vec<String>,
}

impl CommandExecutionResult {
    fn new(command_name: &str) -> Self {
        Self {
            command_name: command_name.to_string(),
            is_success: true,
            log: Vec::new(),
        }
    }

    fn fail(&mut self, message: String) {
        warn!(command = %self.command_name, %message, "automation step failed");
        self.is_success = false;
        self.log.push(message);
    }
}

/// Runs the automation `automation_id` on the draft item `item_id`.
///
/// Failures reported by collaborators are logged in the result, which is
/// then unsuccessful. Errors are returned only when the request itself is
/// wrong.
///
/// A launch point runs each of its commands on its own item when that item
/// owns the command, and otherwise on every materialised instance of the
/// element that owns it.
///
/// # Errors
///
/// [`ToolkitError::NotFound`] for an unknown item,
/// [`ToolkitError::UnknownSchema`] for an unknown automation,
/// [`ToolkitError::AutomationFailed`] when the automation belongs to another
/// element, or [`ToolkitError::MissingCodeTemplateFile`].
pub fn execute_automation(
    draft: &mut Draft,
    item_id: &Identifier,
    automation_id: &Identifier,
    services: AutomationServices<'_>,
) -> Result<CommandExecutionResult> {
    let mut running = Vec::new();
    execute(draft, item_id, automation_id, services, &mut running)
}

fn execute(
    draft: &mut Draft,
    item_id: &Identifier,
    automation_id: &Identifier,
    services: AutomationServices<'_>,
    running: &mut Vec<Identifier>,
) -> Result<CommandExecutionResult> {
    let (owner, automation) = draft.toolkit().resolve_automation(automation_id)?;
    let automation: Automation = automation.clone();
    let owner_id = owner.id().clone();

    let item = draft
        .find_item(item_id)
        .ok_or_else(|| ToolkitError::not_found("draft item", item_id.as_str()))?;
    if item.schema().id != owner_id {
        return Err(ToolkitError::AutomationFailed {
            automation: automation.name().to_string(),
            reason: format!("it does not belong to '{}'", item.name()),
        });
    }

    info!(
        command = %automation.name(),
        kind = %automation.automation_type(),
        item = %item_id,
        "executing automation"
    );
    let mut result = CommandExecutionResult::new(automation.name());
    match automation.kind() {
        AutomationKind::CliCommand {
            application_name,
            arguments,
        } => run_cli(draft, item_id, application_name, arguments, services, &mut result)?,
        AutomationKind::CodeTemplateCommand {
            code_template_id,
            is_one_off,
            file_path,
        } => {
            let command = TemplateCommand {
                id: automation.id(),
                template_id: code_template_id,
                is_one_off: *is_one_off,
                file_path,
            };
            run_code_template(draft, item_id, &command, services, &mut result)?;
        }
        AutomationKind::CommandLaunchPoint { command_ids } => {
            running.push(automation.id().clone());
            for command_id in command_ids {
                if running.contains(command_id) {
                    result.fail(format!("Skipped '{command_id}': it is already running"));
                    continue;
                }
                let (name, targets) = match command_targets(draft, item_id, command_id) {
                    Ok(found) => found,
                    Err(err) => {
                        result.fail(err.to_string());
                        continue;
                    }
                };
                if targets.is_empty() {
                    result
                        .log
                        .push(format!("Skipped '{name}': no materialised items to run it on"));
                    continue;
                }
                for target in &targets {
                    match execute(draft, target, command_id, services, running) {
                        Ok(child) => {
                            result.is_success &= child.is_success;
                            result.log.extend(child.log);
                        }
                        Err(err) => result.fail(err.to_string()),
                    }
                }
            }
            running.pop();
        }
    }
    Ok(result)
}

/// Name of `command_id` and the draft items a launch point on `item_id` runs
/// it on.
fn command_targets(
    draft: &Draft,
    item_id: &Identifier,
    command_id: &Identifier,
) -> Result<(String, Vec<Identifier>)> {
    let (owner, command) = draft.toolkit().resolve_automation(command_id)?;
    let name = command.name().to_string();
    let owns = draft
        .find_item(item_id)
        .is_some_and(|item| item.schema().id == *owner.id());
    if owns {
        return Ok((name, vec![item_id.clone()]));
    }

    let mut targets = Vec::new();
    collect_instances(draft.model(), owner.id(), &mut targets);
    Ok((name, targets))
}

fn collect_instances(item: &DraftItem, schema_id: &Identifier, targets: &mut Vec<Identifier>) {
    let instance = matches!(
        item.kind(),
        SchemaKind::Pattern | SchemaKind::Element | SchemaKind::CollectionItem
    );
    if instance && item.is_materialised() && item.schema().id == *schema_id {
        targets.push(item.id().clone());
    }
    for child in item.children() {
        collect_instances(child, schema_id, targets);
    }
}

fn run_cli(
    draft: &Draft,
    item_id: &Identifier,
    application: &str,
    arguments: &str,
    services: AutomationServices<'_>,
    result: &mut CommandExecutionResult,
) -> Result<()> {
    let dictionary = item_dictionary(draft, item_id)?;
    let arguments = match services.draft_paths.resolve(arguments, &dictionary) {
        Ok(arguments) => arguments,
        Err(err) => {
            result.fail(format!("Failed to resolve arguments '{arguments}': {err}"));
            return Ok(());
        }
    };
    match services.executor.run(application, &arguments) {
        Ok(output) => {
            result
                .log
                .push(format!("Ran '{application} {arguments}': {output}"));
        }
        Err(err) => result.fail(format!("Failed to run '{application} {arguments}': {err}")),
    }
    Ok(())
}

struct TemplateCommand<'a> {
    id: &'a Identifier,
    template_id: &'a Identifier,
    is_one_off: bool,
    file_path: &'a str,
}

fn run_code_template(
    draft: &mut Draft,
    item_id: &Identifier,
    command: &TemplateCommand<'_>,
    services: AutomationServices<'_>,
    result: &mut CommandExecutionResult,
) -> Result<()> {
    let toolkit = draft.toolkit();
    let template_name = toolkit
        .pattern()
        .find_code_template(command.template_id)
        .map_or_else(|| command.template_id.to_string(), |t| t.name().to_string());
    let file = toolkit
        .code_template_file(command.template_id)
        .ok_or_else(|| ToolkitError::MissingCodeTemplateFile(template_name.clone()))?;
    let template = String::from_utf8(file.contents.clone()).map_err(|_| {
        ToolkitError::AutomationFailed {
            automation: result.command_name.clone(),
            reason: format!("code template '{template_name}' is not UTF-8 text"),
        }
    })?;

    let dictionary = item_dictionary(draft, item_id)?;
    let path = match services.draft_paths.resolve(command.file_path, &dictionary) {
        Ok(path) => path,
        Err(err) => {
            result.fail(format!(
                "Failed to resolve file path '{}': {err}",
                command.file_path
            ));
            return Ok(());
        }
    };

    if command.is_one_off {
        let existing = dictionary
            .item()
            .artifact_links()
            .iter()
            .any(|link| link.command_id == *command.id && services.files.exists(&link.path));
        if existing {
            result
                .log
                .push(format!("Skipped '{path}': one-off file already exists"));
            return Ok(());
        }
    }

    let rendered = match services.templates.render(&template, &dictionary) {
        Ok(rendered) => rendered,
        Err(err) => {
            result.fail(format!("Failed to render '{template_name}': {err}"));
            return Ok(());
        }
    };
    if let Err(err) = services.writer.write(&path, &rendered) {
        result.fail(format!("Failed to write '{path}': {err}"));
        return Ok(());
    }

    draft.add_artifact_link(item_id, command.id, &path)?;
    result
        .log
        .push(format!("Generated '{path}' from '{template_name}'"));
    Ok(())
}

fn item_dictionary<'d>(draft: &'d Draft, item_id: &Identifier) -> Result<DraftItemDictionary<'d>> {
    draft
        .item_dictionary(item_id)
        .ok_or_else(|| ToolkitError::not_found("draft item", item_id.as_str()))
}
