//! HTTP transport for manifest downloads.
//!
//! Each download runs on its own thread with a blocking `reqwest` client and
//! reports back through the [`DownloadSink`].

use crate::config::FetchConfig;
use crate::error::{ActionRefError, Result};
use crate::fetch::{DownloadSink, FetchFailure, RemoteProvider};
use reqwest::blocking::Client;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: Client,
}

impl HttpProvider {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    /// Download `url` on the calling thread.
    pub fn fetch(&self, url: &str) -> Result<String> {
        download(&self.client, url)
    }
}

fn download(client: &Client, url: &str) -> Result<String> {
    let response = client.get(url).send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(ActionRefError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response.text()?)
}

impl From<ActionRefError> for FetchFailure {
    fn from(err: ActionRefError) -> Self {
        let status = match &err {
            ActionRefError::HttpStatus { status, .. } => Some(*status),
            ActionRefError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        };
        FetchFailure {
            status,
            message: err.to_string(),
        }
    }
}

impl RemoteProvider for HttpProvider {
    fn start_download(&self, url: &str, sink: DownloadSink) {
        let client = self.client.clone();
        let url = url.to_string();
        let spawned = std::thread::Builder::new()
            .name("actionref-fetch".to_string())
            .spawn(move || {
                let outcome = download(&client, &url).map_err(FetchFailure::from);
                sink.complete(outcome);
            });
        // On spawn failure the closure, and with it the sink, is dropped,
        // which fails the attempt.
        if let Err(e) = spawned {
            warn!(error = %e, "could not spawn download thread");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchCoordinator, FetchState, WaitContext};
    use std::sync::Arc;
    use std::time::Duration;

    fn provider() -> HttpProvider {
        HttpProvider::new(&FetchConfig::default()).unwrap()
    }

    #[test]
    fn fetch_returns_body() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/actions/checkout/v4/action.yml")
            .with_status(200)
            .with_body("name: Checkout\n")
            .create();

        let url = format!("{}/actions/checkout/v4/action.yml", server.url());
        let body = provider().fetch(&url).unwrap();
        assert_eq!(body, "name: Checkout\n");
        mock.assert();
    }

    #[test]
    fn not_found_carries_status() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/o/r/v9/action.yml").with_status(404).create();

        let url = format!("{}/o/r/v9/action.yml", server.url());
        let failure = FetchFailure::from(provider().fetch(&url).unwrap_err());
        assert_eq!(failure.status, Some(404));
        assert!(failure.is_not_found());
        assert!(failure.message.contains("404"));
    }

    #[test]
    fn server_error_is_not_not_found() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/o/r/v1/action.yml").with_status(503).create();

        let url = format!("{}/o/r/v1/action.yml", server.url());
        let failure = FetchFailure::from(provider().fetch(&url).unwrap_err());
        assert_eq!(failure.status, Some(503));
        assert!(!failure.is_not_found());
    }

    #[test]
    fn connection_failure_has_no_status() {
        let failure = FetchFailure::from(provider().fetch("http://127.0.0.1:9/x").unwrap_err());
        assert_eq!(failure.status, None);
    }

    #[test]
    fn background_download_settles_record() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/o/r/v1/action.yml")
            .with_status(200)
            .with_body("inputs:\n  who: {}\n")
            .create();

        let coordinator = FetchCoordinator::new(Arc::new(provider()));
        let url = format!("{}/o/r/v1/action.yml", server.url());
        coordinator.ensure_started(&url);
        let snap = coordinator.await_settled(&url, &WaitContext::default(), Duration::from_secs(10));
        assert_eq!(snap.state, FetchState::Downloaded);
        assert!(snap.manifest.unwrap().input("who").is_some());
    }
}
