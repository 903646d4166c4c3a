//! Configuration types for esprof

use serde::{Deserialize, Serialize};

use crate::{EsprofError, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Exchange recorder behaviour
    #[serde(default)]
    pub recorder: RecorderConfig,
    /// Instrumented HTTP client settings
    #[serde(default)]
    pub client: ClientConfig,
    /// Resource limits
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Recorder configuration
///
/// The defaults produce the canonical diagnostic text; every knob here only
/// removes or shortens output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Attach timings at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Include the `Request:` section
    #[serde(default = "default_true")]
    pub capture_request_body: bool,
    /// Include the `Response:` section
    #[serde(default = "default_true")]
    pub capture_response_body: bool,
    /// Cut bodies longer than this many characters
    #[serde(default)]
    pub max_body_chars: Option<usize>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capture_request_body: true,
            capture_response_body: true,
            max_body_chars: None,
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Cluster base URL, e.g. `http://localhost:9200`
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-attempt timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Idle pooled connection lifetime in seconds
    #[serde(default = "default_pool_idle_timeout_secs")]
    pub pool_idle_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_retries: default_max_retries(),
            request_timeout_ms: default_request_timeout_ms(),
            pool_idle_timeout_secs: default_pool_idle_timeout_secs(),
        }
    }
}

/// Resource limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum concurrently registered sessions
    pub max_sessions: usize,
    /// Maximum custom timings kept per timing node
    pub max_timings_per_node: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_sessions: 1024,
            max_timings_per_node: 10_000,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_max_retries() -> u32 {
    2
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_pool_idle_timeout_secs() -> u64 {
    90
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, parsed, or fails validation
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EsprofError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| EsprofError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        let base_url = self.client.base_url.trim();
        if base_url.is_empty() {
            return Err(EsprofError::ConfigError(
                "client.base_url cannot be empty".to_string(),
            ));
        }

        let uri = base_url.parse::<hyper::Uri>().map_err(|e| {
            EsprofError::ConfigError(format!("client.base_url '{base_url}' is invalid: {e}"))
        })?;
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(EsprofError::ConfigError(format!(
                "client.base_url '{base_url}' must be absolute (scheme://host[:port])"
            )));
        }

        if self.client.request_timeout_ms == 0 {
            return Err(EsprofError::ConfigError(
                "client.request_timeout_ms must be > 0".to_string(),
            ));
        }

        if self.limits.max_sessions == 0 {
            return Err(EsprofError::ConfigError(
                "limits.max_sessions must be > 0".to_string(),
            ));
        }

        if self.limits.max_timings_per_node == 0 {
            return Err(EsprofError::ConfigError(
                "limits.max_timings_per_node must be > 0".to_string(),
            ));
        }

        if self.recorder.max_body_chars == Some(0) {
            return Err(EsprofError::ConfigError(
                "recorder.max_body_chars must be > 0 when set".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_parse() {
        let config_toml = r#"
            [recorder]
            capture_response_body = false
            max_body_chars = 4096

            [client]
            base_url = "http://es.internal:9200"
            max_retries = 5
        "#;

        let config: Config = toml::from_str(config_toml).unwrap();
        assert!(config.recorder.enabled);
        assert!(config.recorder.capture_request_body);
        assert!(!config.recorder.capture_response_body);
        assert_eq!(config.recorder.max_body_chars, Some(4096));
        assert_eq!(config.client.base_url, "http://es.internal:9200");
        assert_eq!(config.client.max_retries, 5);
        assert_eq!(config.client.request_timeout_ms, 30_000);
        assert_eq!(config.limits.max_sessions, 1024);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.recorder.enabled);
        assert_eq!(config.recorder.max_body_chars, None);
        assert_eq!(config.client.base_url, "http://localhost:9200");
        assert_eq!(config.client.max_retries, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        let config_toml = r#"
            [client]
            base_url = "https://search.example.com"
            request_timeout_ms = 500

            [limits]
            max_sessions = 8
            max_timings_per_node = 100
        "#;
        file.write_all(config_toml.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.client.request_timeout_ms, 500);
        assert_eq!(config.limits.max_sessions, 8);
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config = Config::default();
        config.client.base_url = "localhost".to_string();
        assert!(config.validate().is_err());

        config.client.base_url = "   ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_limits() {
        let mut config = Config::default();
        config.limits.max_sessions = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.client.request_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.recorder.max_body_chars = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = Config::from_file(std::path::Path::new("/nonexistent/esprof.toml"));
        assert!(matches!(result, Err(EsprofError::ConfigError(_))));
    }
}
