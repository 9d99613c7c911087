//! Parsing and validation of the `uses:` action reference grammar.
//!
//! Three mutually exclusive shapes are recognised, in priority order:
//!
//! ```text
//! docker://<image>[:<tag>]          → ActionDescriptor::Docker
//! ./<path>                          → ActionDescriptor::Local
//! <owner>/<repo>[/<path>][@<ref>]   → ActionDescriptor::Standard
//! ```
//!
//! Parsing is total: malformed input produces a descriptor with missing
//! fields, and [`ActionDescriptor::is_valid`] decides whether it is usable.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

pub const DOCKER_PREFIX: &str = "docker://";
pub const LOCAL_PREFIX: &str = "./";

/// Sentinel ref for the latest commit on the default branch.
pub const HEAD_REF: &str = "HEAD";

pub const DOCKER_HUB_URL: &str = "https://hub.docker.com/_";

// ---------------------------------------------------------------------------
// Charsets
// ---------------------------------------------------------------------------

static NAME_RE: OnceLock<Regex> = OnceLock::new();
static REF_RE: OnceLock<Regex> = OnceLock::new();
static DOCKER_TAG_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").unwrap())
}

fn ref_re() -> &'static Regex {
    REF_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9./_-]+$").unwrap())
}

fn docker_tag_re() -> &'static Regex {
    DOCKER_TAG_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").unwrap())
}

fn is_trimmed(s: &str) -> bool {
    s.trim() == s
}

fn nullize(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

/// `owner/repo[/path]@ref`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StandardAction {
    pub owner: String,
    pub repo: Option<String>,
    pub path: Option<String>,
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
}

impl StandardAction {
    /// `owner/repo`, or `None` when the reference names only an owner.
    pub fn full_name(&self) -> Option<String> {
        self.repo
            .as_deref()
            .map(|repo| format!("{}/{}", self.owner, repo))
    }

    pub fn is_ref_valid(&self) -> bool {
        self.git_ref.as_deref().is_some_and(|r| ref_re().is_match(r))
    }

    pub fn is_head(&self) -> bool {
        self.git_ref.as_deref() == Some(HEAD_REF)
    }

    pub fn with_ref(&self, new_ref: &str) -> Self {
        Self {
            git_ref: Some(new_ref.to_string()),
            ..self.clone()
        }
    }

    fn is_valid(&self, ignore_ref: bool) -> bool {
        let Some(repo) = self.repo.as_deref() else {
            return false;
        };
        if !is_trimmed(&self.owner)
            || !is_trimmed(repo)
            || self.path.as_deref().is_some_and(|p| !is_trimmed(p))
        {
            return false;
        }
        if !ignore_ref && !self.is_ref_valid() {
            return false;
        }
        name_re().is_match(&self.owner) && name_re().is_match(repo)
    }

    fn canonical_url(&self, web_base: &str) -> Option<String> {
        let repo = self.repo.as_deref()?;
        let git_ref = self.git_ref.as_deref().unwrap_or(HEAD_REF);
        let base = web_base.trim_end_matches('/');
        Some(match &self.path {
            Some(path) => format!("{base}/{}/{repo}/tree/{git_ref}/{path}", self.owner),
            None => format!("{base}/{}/{repo}/tree/{git_ref}", self.owner),
        })
    }
}

/// `docker://image[:tag]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DockerImage {
    pub image: String,
    pub tag: Option<String>,
}

impl DockerImage {
    pub fn is_tag_valid(&self) -> bool {
        self.tag
            .as_deref()
            .is_none_or(|t| docker_tag_re().is_match(t))
    }

    fn is_valid(&self, ignore_tag: bool) -> bool {
        !self.image.is_empty() && is_trimmed(&self.image) && (ignore_tag || self.is_tag_valid())
    }

    fn canonical_url(&self) -> Option<String> {
        if !self.image.contains('/') {
            return Some(format!("{DOCKER_HUB_URL}/{}", self.image));
        }
        let slashes = self.image.matches('/').count();
        let known_registry = self.image.starts_with("ghcr.io/") || self.image.starts_with("gcr.io/");
        if known_registry && slashes == 2 && self.is_valid(false) {
            return Some(format!("https://{}", self.image));
        }
        None
    }
}

/// `./path/to/action`, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LocalAction {
    pub path: String,
}

// ---------------------------------------------------------------------------
// ActionDescriptor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionDescriptor {
    Standard(StandardAction),
    Docker(DockerImage),
    Local(LocalAction),
}

impl ActionDescriptor {
    /// Parse a raw `uses:` value. Never fails.
    pub fn parse(text: &str) -> Self {
        if let Some(docker) = text.strip_prefix(DOCKER_PREFIX) {
            let (image, tag) = match docker.split_once(':') {
                Some((image, tag)) => (image, nullize(tag)),
                None => (docker, None),
            };
            return ActionDescriptor::Docker(DockerImage {
                image: image.to_string(),
                tag,
            });
        }

        if text.starts_with(LOCAL_PREFIX) {
            return ActionDescriptor::Local(LocalAction {
                path: text.to_string(),
            });
        }

        let mut parts = text.split('@');
        let name = parts.next().unwrap_or_default();
        let git_ref = parts.next().and_then(nullize);

        let mut segments = name.split('/');
        let owner = segments.next().unwrap_or_default().to_string();
        let repo = segments.next().and_then(nullize);
        let path = nullize(&segments.collect::<Vec<_>>().join("/"));

        ActionDescriptor::Standard(StandardAction {
            owner,
            repo,
            path,
            git_ref,
        })
    }

    pub fn as_standard(&self) -> Option<&StandardAction> {
        match self {
            ActionDescriptor::Standard(action) => Some(action),
            _ => None,
        }
    }

    pub fn is_standard(&self) -> bool {
        matches!(self, ActionDescriptor::Standard(_))
    }

    pub fn is_docker(&self) -> bool {
        matches!(self, ActionDescriptor::Docker(_))
    }

    pub fn is_local(&self) -> bool {
        matches!(self, ActionDescriptor::Local(_))
    }

    /// `owner/repo` for standard references with a repo; `None` otherwise.
    pub fn full_name(&self) -> Option<String> {
        self.as_standard().and_then(StandardAction::full_name)
    }

    pub fn git_ref(&self) -> Option<&str> {
        self.as_standard().and_then(|a| a.git_ref.as_deref())
    }

    /// Strict validation: the ref must be present and the docker tag
    /// well-formed.
    pub fn is_valid(&self) -> bool {
        self.is_valid_with(false, false)
    }

    pub fn is_valid_with(&self, ignore_ref: bool, ignore_docker_tag: bool) -> bool {
        match self {
            ActionDescriptor::Standard(action) => action.is_valid(ignore_ref),
            ActionDescriptor::Docker(image) => image.is_valid(ignore_docker_tag),
            ActionDescriptor::Local(_) => true,
        }
    }

    /// True for non-standard variants.
    pub fn is_ref_valid(&self) -> bool {
        self.as_standard().is_none_or(StandardAction::is_ref_valid)
    }

    /// True for non-docker variants.
    pub fn is_docker_tag_valid(&self) -> bool {
        match self {
            ActionDescriptor::Docker(image) => image.is_tag_valid(),
            _ => true,
        }
    }

    /// Same descriptor pointing at `new_ref`. Only standard references carry
    /// a ref.
    pub fn with_ref(&self, new_ref: &str) -> Option<Self> {
        self.as_standard()
            .map(|a| ActionDescriptor::Standard(a.with_ref(new_ref)))
    }

    /// Browsable location for hyperlinking.
    pub fn canonical_url(&self, web_base: &str) -> Option<String> {
        match self {
            ActionDescriptor::Standard(action) => action.canonical_url(web_base),
            ActionDescriptor::Docker(image) => image.canonical_url(),
            ActionDescriptor::Local(_) => None,
        }
    }
}

impl fmt::Display for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionDescriptor::Docker(DockerImage { image, tag }) => match tag {
                Some(tag) => write!(f, "{DOCKER_PREFIX}{image}:{tag}"),
                None => write!(f, "{DOCKER_PREFIX}{image}"),
            },
            ActionDescriptor::Local(LocalAction { path }) => f.write_str(path),
            ActionDescriptor::Standard(action) => {
                f.write_str(&action.owner)?;
                if let Some(repo) = &action.repo {
                    write!(f, "/{repo}")?;
                }
                if let Some(path) = &action.path {
                    write!(f, "/{path}")?;
                }
                if let Some(git_ref) = &action.git_ref {
                    write!(f, "@{git_ref}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::str::FromStr for ActionDescriptor {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ActionDescriptor::parse(s))
    }
}

pub fn parse_uses(text: &str) -> ActionDescriptor {
    ActionDescriptor::parse(text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const WEB: &str = "https://github.com";

    fn standard(text: &str) -> StandardAction {
        match ActionDescriptor::parse(text) {
            ActionDescriptor::Standard(a) => a,
            other => panic!("expected standard, got {other:?}"),
        }
    }

    fn docker(text: &str) -> DockerImage {
        match ActionDescriptor::parse(text) {
            ActionDescriptor::Docker(d) => d,
            other => panic!("expected docker, got {other:?}"),
        }
    }

    #[test]
    fn action_and_version() {
        let a = standard("actions/checkout@v2");
        assert_eq!(a.owner, "actions");
        assert_eq!(a.repo.as_deref(), Some("checkout"));
        assert_eq!(a.path, None);
        assert_eq!(a.git_ref.as_deref(), Some("v2"));
        assert_eq!(a.full_name().as_deref(), Some("actions/checkout"));
    }

    #[test]
    fn action_with_nested_path() {
        let a = standard("owner/repo/sub/sub2@v2");
        assert_eq!(a.path.as_deref(), Some("sub/sub2"));
        assert_eq!(a.full_name().as_deref(), Some("owner/repo"));

        let a = standard("owner/repo/sub-action@v2");
        assert_eq!(a.path.as_deref(), Some("sub-action"));
    }

    #[test]
    fn missing_or_empty_ref_is_none() {
        assert_eq!(standard("actions/checkout").git_ref, None);
        assert_eq!(standard("actions/checkout@").git_ref, None);
    }

    #[test]
    fn owner_only_has_no_repo() {
        for text in ["actions", "actions@", "actions/"] {
            let a = standard(text);
            assert_eq!(a.owner, "actions", "{text}");
            assert_eq!(a.repo, None, "{text}");
            assert_eq!(a.path, None, "{text}");
            assert_eq!(a.git_ref, None, "{text}");
            assert_eq!(a.full_name(), None, "{text}");
        }
    }

    #[test]
    fn full_name_undefined_for_other_variants() {
        assert_eq!(ActionDescriptor::parse("docker://ubuntu").full_name(), None);
        assert_eq!(ActionDescriptor::parse("./local").full_name(), None);
    }

    #[test]
    fn docker_with_tag() {
        let d = docker("docker://ubuntu:latest");
        assert_eq!(d.image, "ubuntu");
        assert_eq!(d.tag.as_deref(), Some("latest"));
    }

    #[test]
    fn docker_registry_path_without_tag() {
        let d = docker("docker://ghcr.io/OWNER/IMAGE_NAME");
        assert_eq!(d.image, "ghcr.io/OWNER/IMAGE_NAME");
        assert_eq!(d.tag, None);
        assert!(ActionDescriptor::parse("docker://ghcr.io/OWNER/IMAGE_NAME").is_valid());
    }

    #[test]
    fn docker_ignores_at_and_normalises_empty_tag() {
        let d = docker("docker://alpine@sha256");
        assert_eq!(d.image, "alpine@sha256");
        assert_eq!(d.tag, None);
        assert_eq!(docker("docker://alpine:").tag, None);
    }

    #[test]
    fn local_path_is_verbatim_and_always_valid() {
        let d = ActionDescriptor::parse("./my-dir/with space/hello");
        assert!(matches!(&d, ActionDescriptor::Local(l) if l.path == "./my-dir/with space/hello"));
        assert!(d.is_valid());
        assert!(ActionDescriptor::parse("./my-dir/x").is_valid());
    }

    #[test]
    fn valid_standard_actions() {
        assert!(ActionDescriptor::parse("owner/action@main").is_valid());
        assert!(ActionDescriptor::parse("owner/action/path@main").is_valid());
        assert!(
            ActionDescriptor::parse("my-owner/my-action/path with spaces@versions/v1-2.3").is_valid()
        );
        assert!(ActionDescriptor::parse("docker://ghcr.io/OWNER/IMAGE_NAME:tag").is_valid());
    }

    #[test]
    fn invalid_standard_actions() {
        for text in [
            "o wner/action@main",
            "owner/act ion@main",
            "owner/action@ma in",
            " owner/action@main",
            "owner/action@main ",
            "owner/action",
            "owner/action@",
            "owner@main",
        ] {
            assert!(!ActionDescriptor::parse(text).is_valid(), "expected invalid: {text}");
        }
    }

    #[test]
    fn relaxed_validation_ignores_ref_and_tag() {
        let d = ActionDescriptor::parse("owner/action");
        assert!(d.is_valid_with(true, false));
        assert!(!d.is_ref_valid());

        let d = ActionDescriptor::parse("docker://ubuntu:bad tag");
        assert!(!d.is_valid());
        assert!(d.is_valid_with(false, true));
        assert!(!d.is_docker_tag_valid());
    }

    #[test]
    fn with_ref_produces_new_descriptor() {
        let d = ActionDescriptor::parse("owner/repo/sub@v1");
        let head = d.with_ref(HEAD_REF).unwrap();
        assert_eq!(d.git_ref(), Some("v1"));
        assert_eq!(head.git_ref(), Some("HEAD"));
        assert_eq!(head.to_string(), "owner/repo/sub@HEAD");
        assert!(ActionDescriptor::parse("./x").with_ref(HEAD_REF).is_none());
    }

    #[test]
    fn display_reparses_to_same_descriptor() {
        for text in [
            "actions/checkout@v2",
            "owner/repo/a/b@release/v1",
            "owner/repo",
            "owner",
            "docker://ubuntu:latest",
            "docker://ghcr.io/o/i",
            "./.github/actions/build",
        ] {
            let d = ActionDescriptor::parse(text);
            assert_eq!(d.to_string(), text);
            assert_eq!(ActionDescriptor::parse(&d.to_string()), d);
        }
    }

    #[test]
    fn canonical_urls() {
        let url = |s: &str| ActionDescriptor::parse(s).canonical_url(WEB);
        assert_eq!(
            url("actions/checkout@v2").as_deref(),
            Some("https://github.com/actions/checkout/tree/v2")
        );
        assert_eq!(
            url("owner/repo/sub").as_deref(),
            Some("https://github.com/owner/repo/tree/HEAD/sub")
        );
        assert_eq!(
            url("owner/repo").as_deref(),
            Some("https://github.com/owner/repo/tree/HEAD")
        );
        assert_eq!(url("owner"), None);
        assert_eq!(url("./local"), None);
        assert_eq!(
            url("docker://ubuntu:latest").as_deref(),
            Some("https://hub.docker.com/_/ubuntu")
        );
        assert_eq!(
            url("docker://ghcr.io/owner/image:1.0").as_deref(),
            Some("https://ghcr.io/owner/image")
        );
        assert_eq!(
            url("docker://gcr.io/project/image").as_deref(),
            Some("https://gcr.io/project/image")
        );
        assert_eq!(url("docker://quay.io/owner/image"), None);
        assert_eq!(url("docker://ghcr.io/a/b/c"), None);
    }

    #[test]
    fn from_str_is_infallible() {
        let d: ActionDescriptor = "actions/setup-node@v4".parse().unwrap();
        assert!(d.is_standard());
        assert_eq!(parse_uses("docker://x"), ActionDescriptor::parse("docker://x"));
    }
}
