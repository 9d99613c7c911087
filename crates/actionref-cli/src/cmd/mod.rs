pub mod check;
pub mod config;
pub mod inputs;
pub mod parse;
pub mod status;

use actionref_core::config::Config;
use actionref_core::resolve::MANIFEST_FILE;
use actionref_core::{LookupContext, RemoteManifestCache};
use anyhow::Context;
use std::path::Path;

pub(crate) fn load_config(root: &Path) -> anyhow::Result<Config> {
    Config::load(root).context("failed to load config")
}

pub(crate) fn open_cache(config: &Config) -> anyhow::Result<RemoteManifestCache> {
    RemoteManifestCache::from_config(config).context("failed to set up the HTTP client")
}

/// Lookup context for references given on the command line. Local `./`
/// references resolve from the repository root.
pub(crate) fn root_context(root: &Path) -> LookupContext {
    LookupContext::for_document(root.join(MANIFEST_FILE))
}
