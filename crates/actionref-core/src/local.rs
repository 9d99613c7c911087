use crate::action::LOCAL_PREFIX;
use crate::workflow::workflow_root;
use std::path::{Path, PathBuf};

/// Manifest file names accepted for local actions, in lookup order.
pub const LOCAL_MANIFEST_NAMES: &[&str] = &["action.yml", "action.yaml"];

/// Finds the manifest of a `./path` action referenced from a document.
pub trait LocalManifestLookup: Send + Sync {
    fn find_manifest_near(&self, document: &Path, relative: &str) -> Option<PathBuf>;
}

/// Filesystem lookup. Paths resolve against the repository root when the
/// document is a workflow, otherwise against the document's directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLocalLookup;

impl LocalManifestLookup for FsLocalLookup {
    fn find_manifest_near(&self, document: &Path, relative: &str) -> Option<PathBuf> {
        let base = workflow_root(document).or_else(|| document.parent().map(Path::to_path_buf))?;
        let relative = relative.strip_prefix(LOCAL_PREFIX).unwrap_or(relative);
        let dir = base.join(relative.trim_end_matches('/'));
        LOCAL_MANIFEST_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".github/workflows")).unwrap();
        std::fs::create_dir_all(dir.path().join(".github/actions/setup")).unwrap();
        std::fs::create_dir_all(dir.path().join(".github/actions/yaml-ext")).unwrap();
        std::fs::write(dir.path().join(".github/actions/setup/action.yml"), "name: setup\n").unwrap();
        std::fs::write(dir.path().join(".github/actions/yaml-ext/action.yaml"), "name: y\n").unwrap();
        dir
    }

    #[test]
    fn resolves_against_repo_root_from_workflow() {
        let dir = repo();
        let wf = dir.path().join(".github/workflows/ci.yml");
        let found = FsLocalLookup.find_manifest_near(&wf, "./.github/actions/setup");
        assert_eq!(found, Some(dir.path().join(".github/actions/setup/action.yml")));
    }

    #[test]
    fn accepts_yaml_extension_and_trailing_slash() {
        let dir = repo();
        let wf = dir.path().join(".github/workflows/ci.yml");
        let found = FsLocalLookup.find_manifest_near(&wf, "./.github/actions/yaml-ext/");
        assert_eq!(found, Some(dir.path().join(".github/actions/yaml-ext/action.yaml")));
    }

    #[test]
    fn missing_directory_is_none() {
        let dir = repo();
        let wf = dir.path().join(".github/workflows/ci.yml");
        assert_eq!(FsLocalLookup.find_manifest_near(&wf, "./.github/actions/nope"), None);
    }

    #[test]
    fn non_workflow_documents_resolve_from_their_directory() {
        let dir = repo();
        let doc = dir.path().join(".github/actions/composite.yml");
        let found = FsLocalLookup.find_manifest_near(&doc, "./setup");
        assert_eq!(found, Some(dir.path().join(".github/actions/setup/action.yml")));
    }
}
