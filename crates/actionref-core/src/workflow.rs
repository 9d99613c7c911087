use crate::error::{ActionRefError, Result};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

pub const GITHUB_DIR: &str = ".github";
pub const WORKFLOWS_DIR: &str = "workflows";

// ---------------------------------------------------------------------------
// Workflow paths
// ---------------------------------------------------------------------------

/// True for `*.yml`/`*.yaml` files directly inside `.github/workflows/`.
pub fn is_workflow_path(path: &Path) -> bool {
    workflow_root(path).is_some()
}

/// The repository root owning a workflow file: the parent of `.github`.
pub fn workflow_root(path: &Path) -> Option<PathBuf> {
    let ext = path.extension()?.to_str()?;
    if ext != "yml" && ext != "yaml" {
        return None;
    }
    let workflows = path.parent()?;
    if workflows.file_name()? != WORKFLOWS_DIR {
        return None;
    }
    let github = workflows.parent()?;
    if github.file_name()? != GITHUB_DIR {
        return None;
    }
    github.parent().map(Path::to_path_buf)
}

// ---------------------------------------------------------------------------
// Scanning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsesSite {
    /// `jobs.<id>.steps[n].uses`
    Step,
    /// `jobs.<id>.uses`, a reusable workflow call.
    Job,
}

/// One `uses:` occurrence in a workflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepUses {
    pub job: String,
    pub site: UsesSite,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub uses: String,
    /// Keys of the step's `with:` mapping, in document order.
    pub with: Vec<String>,
}

impl StepUses {
    /// `build.steps[2]` / `deploy`
    pub fn location(&self) -> String {
        match self.step {
            Some(i) => format!("{}.steps[{i}]", self.job),
            None => self.job.clone(),
        }
    }
}

/// One `run:` step in a workflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRun {
    pub job: String,
    pub step: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub run: String,
    /// The step's `shell:`, else the job's `defaults.run.shell`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    /// The job's `runs-on` label, when it is a single string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runs_on: Option<String>,
}

impl StepRun {
    pub fn location(&self) -> String {
        format!("{}.steps[{}]", self.job, self.step)
    }
}

/// Everything a workflow check looks at, in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkflowSteps {
    pub uses: Vec<StepUses>,
    pub runs: Vec<StepRun>,
}

fn string_at(map: &Mapping, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Collect every `uses:` in a workflow document.
pub fn scan(text: &str) -> Result<Vec<StepUses>> {
    scan_steps(text).map(|steps| steps.uses)
}

/// Collect every `uses:` and `run:` in a workflow document.
pub fn scan_steps(text: &str) -> Result<WorkflowSteps> {
    let root: Value = serde_yaml::from_str(text)?;
    let Value::Mapping(root) = root else {
        return Err(ActionRefError::InvalidWorkflow(
            "expected a mapping at the top level".to_string(),
        ));
    };

    let mut found = WorkflowSteps::default();
    let Some(Value::Mapping(jobs)) = root.get("jobs") else {
        return Ok(found);
    };

    for (job_id, job) in jobs {
        let (Some(job_id), Value::Mapping(job)) = (job_id.as_str(), job) else {
            continue;
        };

        if let Some(uses) = string_at(job, "uses") {
            found.uses.push(StepUses {
                job: job_id.to_string(),
                site: UsesSite::Job,
                step: None,
                name: string_at(job, "name"),
                uses,
                with: Vec::new(),
            });
        }

        let runs_on = string_at(job, "runs-on");
        let default_shell = job
            .get("defaults")
            .and_then(|d| d.get("run"))
            .and_then(|r| r.get("shell"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let Some(Value::Sequence(steps)) = job.get("steps") else {
            continue;
        };
        for (index, step) in steps.iter().enumerate() {
            let Value::Mapping(step) = step else {
                continue;
            };
            if let Some(run) = string_at(step, "run") {
                found.runs.push(StepRun {
                    job: job_id.to_string(),
                    step: index,
                    name: string_at(step, "name"),
                    run,
                    shell: string_at(step, "shell").or_else(|| default_shell.clone()),
                    runs_on: runs_on.clone(),
                });
            }
            let Some(uses) = string_at(step, "uses") else {
                continue;
            };
            let with = match step.get("with") {
                Some(Value::Mapping(with)) => with
                    .keys()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
                _ => Vec::new(),
            };
            found.uses.push(StepUses {
                job: job_id.to_string(),
                site: UsesSite::Step,
                step: Some(index),
                name: string_at(step, "name"),
                uses,
                with,
            });
        }
    }

    Ok(found)
}

pub fn scan_file(path: &Path) -> Result<Vec<StepUses>> {
    scan_steps_file(path).map(|steps| steps.uses)
}

pub fn scan_steps_file(path: &Path) -> Result<WorkflowSteps> {
    let data = std::fs::read_to_string(path)?;
    scan_steps(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKFLOW: &str = r#"
name: CI
on: [push]
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
        with:
          fetch-depth: 0
          token: '${{ secrets.TOKEN }}'
      - run: cargo test
      - name: Local
        uses: ./.github/actions/setup
  deploy:
    uses: octo-org/workflows/.github/workflows/deploy.yml@main
    with:
      env: prod
"#;

    #[test]
    fn collects_step_and_job_uses() {
        let found = scan(WORKFLOW).unwrap();
        assert_eq!(found.len(), 3);

        assert_eq!(found[0].uses, "actions/checkout@v4");
        assert_eq!(found[0].site, UsesSite::Step);
        assert_eq!(found[0].with, ["fetch-depth", "token"]);
        assert_eq!(found[0].location(), "build.steps[0]");

        assert_eq!(found[1].uses, "./.github/actions/setup");
        assert_eq!(found[1].name.as_deref(), Some("Local"));
        assert_eq!(found[1].step, Some(2));

        assert_eq!(found[2].site, UsesSite::Job);
        assert_eq!(found[2].location(), "deploy");
        assert!(found[2].with.is_empty());
    }

    #[test]
    fn collects_run_scripts_with_shell() {
        let text = r#"
jobs:
  build:
    runs-on: windows-latest
    defaults:
      run:
        shell: bash
    steps:
      - run: |
          echo one
          echo two
      - name: Legacy
        shell: cmd
        run: echo hi
      - uses: actions/checkout@v4
  matrix:
    runs-on: [self-hosted, linux]
    steps:
      - run: make
"#;
        let steps = scan_steps(text).unwrap();
        assert_eq!(steps.uses.len(), 1);
        assert_eq!(steps.runs.len(), 3);

        assert_eq!(steps.runs[0].run, "echo one\necho two\n");
        assert_eq!(steps.runs[0].shell.as_deref(), Some("bash"));
        assert_eq!(steps.runs[0].runs_on.as_deref(), Some("windows-latest"));

        assert_eq!(steps.runs[1].shell.as_deref(), Some("cmd"));
        assert_eq!(steps.runs[1].name.as_deref(), Some("Legacy"));
        assert_eq!(steps.runs[1].location(), "build.steps[1]");

        assert_eq!(steps.runs[2].shell, None);
        assert_eq!(steps.runs[2].runs_on, None);
    }

    #[test]
    fn workflow_without_jobs_is_empty() {
        assert!(scan("name: nothing\n").unwrap().is_empty());
    }

    #[test]
    fn non_mapping_workflow_is_rejected() {
        assert!(matches!(
            scan("- a\n").unwrap_err(),
            ActionRefError::InvalidWorkflow(_)
        ));
    }

    #[test]
    fn workflow_paths() {
        let root = Path::new("/repo");
        let wf = root.join(".github/workflows/ci.yml");
        assert!(is_workflow_path(&wf));
        assert_eq!(workflow_root(&wf).as_deref(), Some(root));
        assert!(is_workflow_path(&root.join(".github/workflows/release.yaml")));
        assert!(!is_workflow_path(&root.join(".github/workflows/readme.md")));
        assert!(!is_workflow_path(&root.join(".github/ci.yml")));
        assert!(!is_workflow_path(&root.join("workflows/ci.yml")));
        assert!(!is_workflow_path(&root.join(".github/workflows/nested/ci.yml")));
    }
}
