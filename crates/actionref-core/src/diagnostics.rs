//! Lint checks for `uses:` values, the `with:` keys passed to an action, and
//! deprecated workflow commands echoed by `run:` scripts.

use crate::action::ActionDescriptor;
use crate::cache::{ActionStatus, LookupContext, RemoteManifestCache};
use crate::commands::{self, DeprecatedCommand, ShellType};
use crate::error::Result;
use crate::manifest::ActionManifest;
use crate::workflow::{self, StepRun, StepUses, UsesSite};
use serde::Serialize;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Deprecated,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Deprecated => "deprecated",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// uses:
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UsesDiagnostic {
    Untrimmed,
    Invalid,
    InvalidRef,
    InvalidDockerTag,
    MissingRef,
    NotFetched { action: String },
    ActionNotFound { action: String },
    RevisionNotFound { action: String, git_ref: String },
}

impl UsesDiagnostic {
    pub fn severity(&self) -> Severity {
        match self {
            UsesDiagnostic::NotFetched { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn message(&self) -> String {
        match self {
            UsesDiagnostic::Untrimmed => "leading or trailing whitespace is not allowed".into(),
            UsesDiagnostic::Invalid => "invalid action reference".into(),
            UsesDiagnostic::InvalidRef => "invalid ref".into(),
            UsesDiagnostic::InvalidDockerTag => "invalid docker tag".into(),
            UsesDiagnostic::MissingRef => "missing ref, use <owner>/<repo>@<ref>".into(),
            UsesDiagnostic::NotFetched { action } => {
                format!("could not download the manifest of '{action}'")
            }
            UsesDiagnostic::ActionNotFound { action } => format!("action '{action}' not found"),
            UsesDiagnostic::RevisionNotFound { action, git_ref } => {
                format!("ref '{git_ref}' not found in '{action}'")
            }
        }
    }
}

impl fmt::Display for UsesDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Check one raw `uses:` value. The first failing rule wins; `status` is only
/// consulted for well-formed standard references.
pub fn check_uses(
    text: &str,
    status: impl FnOnce(&ActionDescriptor) -> ActionStatus,
) -> Option<UsesDiagnostic> {
    if text.is_empty() {
        return None;
    }
    if text.trim() != text {
        return Some(UsesDiagnostic::Untrimmed);
    }

    let descriptor = ActionDescriptor::parse(text);
    if !descriptor.is_valid_with(true, true) {
        return Some(UsesDiagnostic::Invalid);
    }
    if descriptor.git_ref().is_some() && !descriptor.is_ref_valid() {
        return Some(UsesDiagnostic::InvalidRef);
    }
    if !descriptor.is_docker_tag_valid() {
        return Some(UsesDiagnostic::InvalidDockerTag);
    }

    let ActionDescriptor::Standard(action) = &descriptor else {
        return None;
    };
    let Some(git_ref) = action.git_ref.clone() else {
        return Some(UsesDiagnostic::MissingRef);
    };
    let name = action.full_name().unwrap_or_else(|| action.owner.clone());
    match status(&descriptor) {
        ActionStatus::Failed => Some(UsesDiagnostic::NotFetched { action: name }),
        ActionStatus::ActionNotFound => Some(UsesDiagnostic::ActionNotFound { action: name }),
        ActionStatus::ActionRevisionNotFound => Some(UsesDiagnostic::RevisionNotFound {
            action: name,
            git_ref,
        }),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// with:
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputDiagnostic {
    UnknownInput { input: String },
    DeprecatedInput { input: String, message: String },
    MissingRequiredInput { input: String },
}

impl InputDiagnostic {
    pub fn input(&self) -> &str {
        match self {
            InputDiagnostic::UnknownInput { input }
            | InputDiagnostic::DeprecatedInput { input, .. }
            | InputDiagnostic::MissingRequiredInput { input } => input,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            InputDiagnostic::DeprecatedInput { .. } => Severity::Deprecated,
            InputDiagnostic::UnknownInput { .. } | InputDiagnostic::MissingRequiredInput { .. } => {
                Severity::Warning
            }
        }
    }

    pub fn message(&self) -> String {
        match self {
            InputDiagnostic::UnknownInput { input } => format!("input '{input}' is not declared"),
            InputDiagnostic::DeprecatedInput { input, message } => {
                format!("input '{input}' is deprecated: {message}")
            }
            InputDiagnostic::MissingRequiredInput { input } => {
                format!("required input '{input}' is not set")
            }
        }
    }
}

impl fmt::Display for InputDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Compare the keys of a step's `with:` mapping against the manifest.
pub fn check_inputs<S: AsRef<str>>(manifest: &ActionManifest, with_keys: &[S]) -> Vec<InputDiagnostic> {
    let mut found = Vec::new();
    for key in with_keys.iter().map(AsRef::as_ref) {
        match manifest.input(key) {
            None => found.push(InputDiagnostic::UnknownInput {
                input: key.to_string(),
            }),
            Some(input) => {
                if let Some(message) = &input.deprecation_message {
                    found.push(InputDiagnostic::DeprecatedInput {
                        input: key.to_string(),
                        message: message.clone(),
                    });
                }
            }
        }
    }
    for input in manifest.required_inputs() {
        if !with_keys.iter().any(|k| k.as_ref() == input.name) {
            found.push(InputDiagnostic::MissingRequiredInput {
                input: input.name.clone(),
            });
        }
    }
    found
}

// ---------------------------------------------------------------------------
// Workflow files
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Finding {
    Uses(UsesDiagnostic),
    Input(InputDiagnostic),
    Command(DeprecatedCommand),
}

impl Finding {
    pub fn severity(&self) -> Severity {
        match self {
            Finding::Uses(d) => d.severity(),
            Finding::Input(d) => d.severity(),
            Finding::Command(_) => Severity::Warning,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Finding::Uses(d) => d.message(),
            Finding::Input(d) => d.message(),
            Finding::Command(d) => d.message(),
        }
    }
}

/// A finding located in a workflow.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowDiagnostic {
    pub location: String,
    /// The `uses:` value the finding is about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,
    /// 1-based line within a `run:` script.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub severity: Severity,
    pub message: String,
    pub finding: Finding,
}

impl WorkflowDiagnostic {
    fn new(step: &StepUses, finding: Finding) -> Self {
        Self {
            location: step.location(),
            uses: Some(step.uses.clone()),
            line: None,
            severity: finding.severity(),
            message: finding.message(),
            finding,
        }
    }

    fn command(step: &StepRun, command: DeprecatedCommand) -> Self {
        let line = command.line;
        let finding = Finding::Command(command);
        Self {
            location: step.location(),
            uses: None,
            line: Some(line),
            severity: finding.severity(),
            message: finding.message(),
            finding,
        }
    }
}

/// Run every check over the workflow at `path`.
///
/// Job-level `uses:` call reusable workflows, which have no `action.yml`, so
/// only step-level references are checked. Input checks only run when the
/// reference itself is clean and its manifest is available. `run:` scripts
/// are only inspected for files inside `.github/workflows/`.
pub fn check_workflow(path: &Path, cache: &RemoteManifestCache) -> Result<Vec<WorkflowDiagnostic>> {
    let steps = workflow::scan_steps_file(path)?;
    let ctx = LookupContext::for_document(path);

    let mut found = Vec::new();
    for step in &steps.uses {
        if step.site == UsesSite::Job {
            continue;
        }
        if let Some(d) = check_uses(&step.uses, |descriptor| cache.status(descriptor, &ctx)) {
            found.push(WorkflowDiagnostic::new(step, Finding::Uses(d)));
            continue;
        }
        if step.uses.is_empty() {
            continue;
        }
        let descriptor = ActionDescriptor::parse(&step.uses);
        if descriptor.is_docker() {
            continue;
        }
        if let Some(manifest) = cache.manifest(&descriptor, &ctx) {
            found.extend(
                check_inputs(&manifest, &step.with)
                    .into_iter()
                    .map(|d| WorkflowDiagnostic::new(step, Finding::Input(d))),
            );
        }
    }

    if workflow::is_workflow_path(path) {
        found.extend(check_run_steps(&steps.runs));
    }
    Ok(found)
}

/// Deprecated workflow commands in `run:` scripts, using each step's shell or
/// the default shell of its runner.
pub fn check_run_steps(runs: &[StepRun]) -> Vec<WorkflowDiagnostic> {
    let mut found = Vec::new();
    for step in runs {
        let shell = ShellType::guess(step.shell.as_deref(), step.runs_on.as_deref());
        found.extend(
            commands::find_deprecated_commands(&step.run, shell)
                .into_iter()
                .map(|d| WorkflowDiagnostic::command(step, d)),
        );
    }
    found
}
