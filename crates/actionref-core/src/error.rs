use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActionRefError {
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("invalid workflow: {0}")]
    InvalidWorkflow(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("request failed with status code {status}: {url}")]
    HttpStatus { url: String, status: u16 },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ActionRefError>;
