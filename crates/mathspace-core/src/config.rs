//! Configuration
//!
//! [`MathSpaceConfig`] groups four sections. Every field has a default, so
//! an empty or partial TOML file is valid:
//!
//! ```toml
//! [llm]
//! base_url = "https://api.deepseek.com"
//! model = "deepseek-chat"
//!
//! [pipeline]
//! max_retries = 2
//!
//! [paths]
//! static_dir = "static"
//! work_dir = "temp_gen"
//! ```
//!
//! The API key is taken from `MATHSPACE_API_KEY` and never written back out.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable supplying the LLM API key
pub const API_KEY_ENV: &str = "MATHSPACE_API_KEY";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MathSpaceConfig {
    pub llm: LlmConfig,
    pub render: RenderConfig,
    pub pipeline: PipelineConfig,
    pub paths: PathsConfig,
}

impl MathSpaceConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from an optional TOML file, then apply the environment
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed, or if
    /// the resulting configuration is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            None => Self::default(),
        };

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                config.llm.api_key = Some(key);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the pipeline unusable
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let zero_checks = [
            ("llm.request_timeout_secs", self.llm.request_timeout_secs),
            ("render.timeout_secs", self.render.timeout_secs),
            ("pipeline.history_capacity", self.pipeline.history_capacity as u64),
            ("pipeline.digest_window", self.pipeline.digest_window as u64),
        ];
        if let Some((field, _)) = zero_checks.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{field} must be greater than zero")));
        }
        if self.llm.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("llm.base_url must not be empty".to_string()));
        }
        if self.render.scene_name.trim().is_empty() {
            return Err(ConfigError::Invalid("render.scene_name must not be empty".to_string()));
        }
        Ok(())
    }

    /// With API key
    #[inline]
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.llm.api_key = Some(key.into());
        self
    }

    /// With static and work directories
    #[inline]
    #[must_use]
    pub fn with_paths(mut self, static_dir: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        self.paths.static_dir = static_dir.into();
        self.paths.work_dir = work_dir.into();
        self
    }

    /// With repair budget
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, retries: usize) -> Self {
        self.pipeline.max_retries = retries;
        self
    }

    /// With history capacity
    #[inline]
    #[must_use]
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.pipeline.history_capacity = capacity;
        self
    }

    /// With LLM request timeout
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.llm.request_timeout_secs = timeout.as_secs().max(1);
        self
    }
}

/// LLM vendor settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub request_timeout_secs: u64,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl LlmConfig {
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
            request_timeout_secs: 120,
            api_key: None,
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Renderer invocation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub python: String,
    pub quality_flag: String,
    pub scene_name: String,
    pub timeout_secs: u64,
}

impl RenderConfig {
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            python: "python".to_string(),
            quality_flag: "-ql".to_string(),
            scene_name: "MathScene".to_string(),
            timeout_secs: 300,
        }
    }
}

/// Pipeline limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Repair budget; execution attempts are `max_retries + 1`
    pub max_retries: usize,
    pub history_capacity: usize,
    pub digest_window: usize,
    pub preview_chars: usize,
    pub error_tail_chars: usize,
    pub draft_storage_chars: usize,
}

impl PipelineConfig {
    #[inline]
    #[must_use]
    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            history_capacity: 15,
            digest_window: 3,
            preview_chars: 500,
            error_tail_chars: 500,
            draft_storage_chars: 500,
        }
    }
}

/// Filesystem layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub static_dir: PathBuf,
    pub work_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            static_dir: PathBuf::from("static"),
            work_dir: PathBuf::from("temp_gen"),
        }
    }
}
