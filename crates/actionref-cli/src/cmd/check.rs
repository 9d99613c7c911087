use crate::output::print_json;
use actionref_core::diagnostics::{check_workflow, Severity, WorkflowDiagnostic};
use actionref_core::workflow::is_workflow_path;
use anyhow::Context;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Serialize)]
struct FileReport {
    file: PathBuf,
    diagnostics: Vec<WorkflowDiagnostic>,
}

pub fn run(root: &Path, files: &[PathBuf], json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let cache = super::open_cache(&config)?;

    let mut reports = Vec::new();
    for file in files {
        let path = if file.is_absolute() {
            file.clone()
        } else {
            root.join(file)
        };
        if !is_workflow_path(&path) {
            info!(file = %path.display(), "checking a file outside .github/workflows");
        }
        let diagnostics = check_workflow(&path, &cache)
            .with_context(|| format!("failed to check {}", file.display()))?;
        reports.push(FileReport {
            file: file.clone(),
            diagnostics,
        });
    }

    let errors = reports
        .iter()
        .flat_map(|r| &r.diagnostics)
        .filter(|d| d.severity == Severity::Error)
        .count();

    if json {
        print_json(&reports)?;
    } else {
        for report in &reports {
            for d in &report.diagnostics {
                let line = d.line.map(|n| format!(" line {n}")).unwrap_or_default();
                let uses = d.uses.as_ref().map(|u| format!(" [{u}]")).unwrap_or_default();
                println!(
                    "{}:{}{line}: {}: {}{uses}",
                    report.file.display(),
                    d.location,
                    d.severity,
                    d.message,
                );
            }
        }
        let total: usize = reports.iter().map(|r| r.diagnostics.len()).sum();
        if total == 0 {
            println!("No problems found.");
        }
    }

    if errors > 0 {
        anyhow::bail!("{errors} error(s) found");
    }
    Ok(())
}
