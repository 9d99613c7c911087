pub mod action;
pub mod cache;
pub mod commands;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fetch;
pub mod http;
pub mod local;
pub mod manifest;
pub mod resolve;
pub mod workflow;

pub use action::ActionDescriptor;
pub use cache::{ActionStatus, LookupContext, RemoteManifestCache};
pub use error::{ActionRefError, Result};
