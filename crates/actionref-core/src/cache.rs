//! Status and manifest lookups for action references.
//!
//! ```text
//! uses string ─▶ ActionDescriptor ─▶ ManifestUrlResolver ─▶ FetchCoordinator
//!                                           │ (no URL)              │
//!                                           ▼                       ▼
//!                                  LocalManifestLookup        FetchSnapshot
//!                                           └──────────┬────────────┘
//!                                                      ▼
//!                                                ActionStatus
//! ```
//!
//! None of the lookups here return errors: failures are encoded in the
//! returned [`ActionStatus`] or as `None`.

use crate::action::{ActionDescriptor, StandardAction, HEAD_REF};
use crate::config::Config;
use crate::error::Result;
use crate::fetch::{FetchCoordinator, FetchSnapshot, FetchState, WaitContext};
use crate::http::HttpProvider;
use crate::local::{FsLocalLookup, LocalManifestLookup};
use crate::manifest::ActionManifest;
use crate::resolve::ManifestUrlResolver;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// ActionStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Nothing can be said about the action.
    Unknown,
    /// The manifest could not be fetched for a reason other than 404.
    Failed,
    /// Still downloading.
    InProgress,
    /// The manifest is available and parses.
    Ok,
    /// Not even the default branch has a manifest.
    ActionNotFound,
    /// The action exists, but not at the requested ref.
    ActionRevisionNotFound,
}

impl ActionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionStatus::Unknown => "unknown",
            ActionStatus::Failed => "failed",
            ActionStatus::InProgress => "in_progress",
            ActionStatus::Ok => "ok",
            ActionStatus::ActionNotFound => "action_not_found",
            ActionStatus::ActionRevisionNotFound => "action_revision_not_found",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// LookupContext
// ---------------------------------------------------------------------------

/// Who is asking: the document containing the reference (needed for local
/// actions) and how the caller may wait.
#[derive(Debug, Clone, Default)]
pub struct LookupContext {
    pub document: Option<PathBuf>,
    pub wait: WaitContext,
}

impl LookupContext {
    pub fn for_document(document: impl Into<PathBuf>) -> Self {
        Self {
            document: Some(document.into()),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteManifestCache
// ---------------------------------------------------------------------------

pub struct RemoteManifestCache {
    coordinator: Arc<FetchCoordinator>,
    resolver: ManifestUrlResolver,
    local: Arc<dyn LocalManifestLookup>,
    max_wait: Duration,
}

impl fmt::Debug for RemoteManifestCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteManifestCache")
            .field("coordinator", &self.coordinator)
            .field("resolver", &self.resolver)
            .field("max_wait", &self.max_wait)
            .finish_non_exhaustive()
    }
}

impl RemoteManifestCache {
    pub fn new(
        coordinator: Arc<FetchCoordinator>,
        resolver: ManifestUrlResolver,
        local: Arc<dyn LocalManifestLookup>,
        max_wait: Duration,
    ) -> Self {
        Self {
            coordinator,
            resolver,
            local,
            max_wait,
        }
    }

    /// HTTP-backed cache with filesystem local lookup, configured from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = HttpProvider::new(&config.fetch)?;
        let coordinator =
            FetchCoordinator::with_poll_interval(Arc::new(provider), config.fetch.poll_interval());
        Ok(Self::new(
            Arc::new(coordinator),
            ManifestUrlResolver::new(config.github.raw_base.clone()),
            Arc::new(FsLocalLookup),
            config.fetch.wait_timeout(),
        ))
    }

    pub fn coordinator(&self) -> &Arc<FetchCoordinator> {
        &self.coordinator
    }

    pub fn resolver(&self) -> &ManifestUrlResolver {
        &self.resolver
    }

    pub fn status(&self, descriptor: &ActionDescriptor, ctx: &LookupContext) -> ActionStatus {
        if !descriptor.is_valid_with(true, true) {
            return ActionStatus::Unknown;
        }

        // Only standard references have a remote manifest.
        let (Some(action), Some(url)) = (
            descriptor.as_standard(),
            self.resolver.manifest_url(descriptor),
        ) else {
            return match self.local_manifest(descriptor, ctx) {
                Some(_) => ActionStatus::Ok,
                None => ActionStatus::Unknown,
            };
        };

        let snapshot = self.settle(&url, ctx);
        let status = match snapshot.state {
            FetchState::InProgress => ActionStatus::InProgress,
            FetchState::Downloaded if snapshot.manifest.is_some() => ActionStatus::Ok,
            FetchState::Downloaded | FetchState::NotStarted => ActionStatus::Unknown,
            FetchState::Error => self.classify_failure(action, &snapshot, ctx),
        };
        debug!(uses = %descriptor, url = %url, status = %status, "action status");
        status
    }

    fn classify_failure(
        &self,
        action: &StandardAction,
        snapshot: &FetchSnapshot,
        ctx: &LookupContext,
    ) -> ActionStatus {
        let not_found = snapshot.failure.as_ref().is_some_and(|f| f.is_not_found());
        if !not_found {
            return ActionStatus::Failed;
        }
        if action.is_head() {
            return ActionStatus::ActionNotFound;
        }
        // Look the action up on the default branch to tell a missing action
        // from a missing ref.
        let head = ActionDescriptor::Standard(action.with_ref(HEAD_REF));
        match self.status(&head, ctx) {
            ActionStatus::Ok => ActionStatus::ActionRevisionNotFound,
            other => other,
        }
    }

    /// The parsed manifest, when downloaded (remote) or found on disk (local).
    pub fn manifest(
        &self,
        descriptor: &ActionDescriptor,
        ctx: &LookupContext,
    ) -> Option<Arc<ActionManifest>> {
        if !descriptor.is_valid_with(true, true) {
            return None;
        }
        let Some(url) = self.resolver.manifest_url(descriptor) else {
            return self.local_manifest(descriptor, ctx);
        };
        let snapshot = self.settle(&url, ctx);
        match snapshot.state {
            FetchState::Downloaded => snapshot.manifest,
            _ => None,
        }
    }

    /// Force a re-download of the manifest for `uses`, and of its `HEAD`
    /// manifest unless `uses` already points at `HEAD`.
    pub fn refresh(&self, uses: &str) {
        let descriptor = ActionDescriptor::parse(uses);
        let Some(url) = self.resolver.manifest_url(&descriptor) else {
            return;
        };
        info!(uses = %uses, "refreshing action");
        self.coordinator.restart(&url);

        if descriptor.git_ref() != Some(HEAD_REF) {
            if let Some(head_url) = descriptor
                .with_ref(HEAD_REF)
                .and_then(|head| self.resolver.manifest_url(&head))
            {
                if head_url != url {
                    self.coordinator.restart(&head_url);
                }
            }
        }
    }

    /// Let every failed download try once more on its next lookup.
    pub fn retry_all_failed(&self) {
        let generation = self.coordinator.bump_generation();
        info!(generation, "retrying failed downloads");
    }

    fn settle(&self, url: &str, ctx: &LookupContext) -> FetchSnapshot {
        self.coordinator.ensure_started(url);
        self.coordinator.await_settled(url, &ctx.wait, self.max_wait)
    }

    fn local_manifest(
        &self,
        descriptor: &ActionDescriptor,
        ctx: &LookupContext,
    ) -> Option<Arc<ActionManifest>> {
        let ActionDescriptor::Local(local) = descriptor else {
            return None;
        };
        let document = ctx.document.as_deref()?;
        let path = self.local.find_manifest_near(document, &local.path)?;
        match ActionManifest::load(&path) {
            Ok(manifest) => Some(Arc::new(manifest)),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "local manifest does not parse");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
