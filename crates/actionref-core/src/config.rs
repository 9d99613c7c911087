use crate::error::{ActionRefError, Result};
use crate::resolve::DEFAULT_RAW_BASE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = ".github/actionref.yaml";

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// FetchConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Longest a blocking lookup waits before falling back to a wake-up.
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_wait_timeout_ms() -> u64 {
    10_000
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("actionref/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: default_wait_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl FetchConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// GithubConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Host serving raw `action.yml` files.
    #[serde(default = "default_raw_base")]
    pub raw_base: String,
    /// Host used for browsable links.
    #[serde(default = "default_web_base")]
    pub web_base: String,
}

fn default_raw_base() -> String {
    DEFAULT_RAW_BASE.to_string()
}

fn default_web_base() -> String {
    "https://github.com".to_string()
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            raw_base: default_raw_base(),
            web_base: default_web_base(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub github: GithubConfig,
}

impl Config {
    /// Load `<root>/.github/actionref.yaml`, or defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        Self::parse(&data)
    }

    pub fn parse(data: &str) -> Result<Self> {
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(data)
            .map_err(|e| ActionRefError::InvalidConfig(format!("{CONFIG_FILE}: {e}")))
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let fetch = &self.fetch;

        if fetch.poll_interval_ms == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "fetch.poll_interval_ms must be greater than 0".to_string(),
            });
        } else if fetch.poll_interval_ms > fetch.wait_timeout_ms {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "fetch.poll_interval_ms ({}) exceeds fetch.wait_timeout_ms ({})",
                    fetch.poll_interval_ms, fetch.wait_timeout_ms
                ),
            });
        }

        if fetch.request_timeout_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "fetch.request_timeout_secs must be greater than 0".to_string(),
            });
        }

        for (key, value) in [
            ("github.raw_base", &self.github.raw_base),
            ("github.web_base", &self.github.web_base),
        ] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("{key} '{value}' is not an http(s) URL"),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.fetch.wait_timeout_ms, 10_000);
        assert_eq!(cfg.fetch.poll_interval_ms, 50);
        assert_eq!(cfg.github.raw_base, "https://raw.githubusercontent.com");
        assert!(cfg.fetch.user_agent.starts_with("actionref/"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".github")).unwrap();
        std::fs::write(
            config_path(dir.path()),
            "fetch:\n  wait_timeout_ms: 250\ngithub:\n  raw_base: http://localhost:8080\n",
        )
        .unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.fetch.wait_timeout(), Duration::from_millis(250));
        assert_eq!(cfg.fetch.poll_interval_ms, 50);
        assert_eq!(cfg.github.raw_base, "http://localhost:8080");
        assert_eq!(cfg.github.web_base, "https://github.com");
    }

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = Config::parse("  \n").unwrap();
        assert_eq!(cfg.fetch.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn malformed_file_is_config_error() {
        let err = Config::parse("fetch: [").unwrap_err();
        assert!(matches!(err, ActionRefError::InvalidConfig(_)));
        assert!(err.to_string().contains(CONFIG_FILE));
    }

    #[test]
    fn default_config_validates_clean() {
        assert!(Config::default().validate().is_empty());
    }

    #[test]
    fn validate_flags_bad_values() {
        let mut cfg = Config::default();
        cfg.fetch.poll_interval_ms = 0;
        cfg.fetch.request_timeout_secs = 0;
        cfg.github.web_base = "github.com".to_string();
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().all(|w| w.level == WarnLevel::Error));
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("github.web_base 'github.com'")));
    }

    #[test]
    fn validate_warns_when_poll_exceeds_wait() {
        let mut cfg = Config::default();
        cfg.fetch.wait_timeout_ms = 10;
        cfg.fetch.poll_interval_ms = 100;
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Warning);
    }
}
