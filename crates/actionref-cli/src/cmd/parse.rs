use crate::output::{print_fields, print_json};
use actionref_core::action::ActionDescriptor;
use actionref_core::diagnostics::check_uses;
use actionref_core::resolve::ManifestUrlResolver;
use actionref_core::ActionStatus;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct ParseOutput<'a> {
    uses: &'a str,
    descriptor: &'a ActionDescriptor,
    display: String,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    canonical_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    manifest_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    problem: Option<String>,
}

/// Offline: never downloads anything.
pub fn run(root: &Path, uses: &str, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let resolver = ManifestUrlResolver::new(config.github.raw_base.clone());
    let descriptor = ActionDescriptor::parse(uses);

    let out = ParseOutput {
        uses,
        descriptor: &descriptor,
        display: descriptor.to_string(),
        valid: descriptor.is_valid(),
        canonical_url: descriptor.canonical_url(&config.github.web_base),
        manifest_url: resolver.manifest_url(&descriptor),
        problem: check_uses(uses, |_| ActionStatus::Unknown).map(|d| d.message()),
    };

    if json {
        return print_json(&out);
    }

    let mut fields = vec![("kind", Some(kind(&descriptor).to_string()))];
    match &descriptor {
        ActionDescriptor::Standard(a) => {
            fields.push(("owner", Some(a.owner.clone())));
            fields.push(("repo", a.repo.clone()));
            fields.push(("path", a.path.clone()));
            fields.push(("ref", a.git_ref.clone()));
        }
        ActionDescriptor::Docker(d) => {
            fields.push(("image", Some(d.image.clone())));
            fields.push(("tag", d.tag.clone()));
        }
        ActionDescriptor::Local(l) => fields.push(("path", Some(l.path.clone()))),
    }
    fields.push(("valid", Some(out.valid.to_string())));
    fields.push(("url", out.canonical_url));
    fields.push(("manifest", out.manifest_url));
    if let Some(problem) = out.problem {
        fields.push(("problem", Some(problem)));
    }
    print_fields(&fields);
    Ok(())
}

fn kind(descriptor: &ActionDescriptor) -> &'static str {
    match descriptor {
        ActionDescriptor::Standard(_) => "standard",
        ActionDescriptor::Docker(_) => "docker",
        ActionDescriptor::Local(_) => "local",
    }
}
