use crate::action::{ActionDescriptor, HEAD_REF};

pub const DEFAULT_RAW_BASE: &str = "https://raw.githubusercontent.com";
pub const MANIFEST_FILE: &str = "action.yml";

/// Maps standard action references to the raw-content URL of their
/// `action.yml`. Pure; never touches the network.
#[derive(Debug, Clone)]
pub struct ManifestUrlResolver {
    raw_base: String,
}

impl Default for ManifestUrlResolver {
    fn default() -> Self {
        Self::new(DEFAULT_RAW_BASE)
    }
}

impl ManifestUrlResolver {
    pub fn new(raw_base: impl Into<String>) -> Self {
        let raw_base: String = raw_base.into();
        Self {
            raw_base: raw_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn raw_base(&self) -> &str {
        &self.raw_base
    }

    /// `None` for docker and local references, and for standard references
    /// without a repo. A missing or malformed ref falls back to `HEAD`.
    pub fn manifest_url(&self, descriptor: &ActionDescriptor) -> Option<String> {
        let action = descriptor.as_standard()?;
        let repo = action.repo.as_deref()?;
        let git_ref = match action.git_ref.as_deref() {
            Some(r) if action.is_ref_valid() => r,
            _ => HEAD_REF,
        };
        let file = match action.path.as_deref() {
            Some(path) => format!("{path}/{MANIFEST_FILE}"),
            None => MANIFEST_FILE.to_string(),
        };
        Some(format!(
            "{}/{}/{repo}/{git_ref}/{file}",
            self.raw_base, action.owner
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(text: &str) -> Option<String> {
        ManifestUrlResolver::default().manifest_url(&ActionDescriptor::parse(text))
    }

    #[test]
    fn root_manifest() {
        assert_eq!(
            url("actions/checkout@v4").as_deref(),
            Some("https://raw.githubusercontent.com/actions/checkout/v4/action.yml")
        );
    }

    #[test]
    fn nested_manifest() {
        assert_eq!(
            url("owner/repo/a/b@release/v1").as_deref(),
            Some("https://raw.githubusercontent.com/owner/repo/release/v1/a/b/action.yml")
        );
    }

    #[test]
    fn missing_or_invalid_ref_falls_back_to_head() {
        assert_eq!(
            url("owner/repo").as_deref(),
            Some("https://raw.githubusercontent.com/owner/repo/HEAD/action.yml")
        );
        assert_eq!(
            url("owner/repo@bad ref").as_deref(),
            Some("https://raw.githubusercontent.com/owner/repo/HEAD/action.yml")
        );
    }

    #[test]
    fn no_url_for_docker_local_or_owner_only() {
        assert_eq!(url("docker://ubuntu:latest"), None);
        assert_eq!(url("./.github/actions/build"), None);
        assert_eq!(url("owner@v1"), None);
    }

    #[test]
    fn custom_base_is_trimmed() {
        let resolver = ManifestUrlResolver::new("http://127.0.0.1:1234/");
        assert_eq!(
            resolver
                .manifest_url(&ActionDescriptor::parse("o/r@v1"))
                .as_deref(),
            Some("http://127.0.0.1:1234/o/r/v1/action.yml")
        );
    }
}
