//! Service configuration.
//!
//! Loaded from a TOML file; every section falls back to defaults so a partial
//! file is valid.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::matching::{embedding, MatchOptions, DEFAULT_LIMIT, DEFAULT_MODEL, DEFAULT_THRESHOLD};

/// Default HTTP listen address.
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:8080";

/// Default request timeout for a matching call, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default number of decimal places kept in API scores.
pub const DEFAULT_SCORE_PRECISION: u32 = 4;

/// Largest precision an `f32` score can meaningfully carry.
pub const MAX_SCORE_PRECISION: u32 = 7;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub api: ApiSection,
    pub matching: MatchingSection,
    pub model: ModelSection,
    pub directory: DirectorySection,
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub listen_address: String,
    pub cors_enabled: bool,
    pub cors_origins: Vec<String>,
    /// Upper bound on a single `/match` call.
    pub request_timeout_secs: u64,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            cors_enabled: true,
            cors_origins: vec!["*".to_string()],
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ApiSection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Ranking parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingSection {
    /// Minimum score for a candidate to be returned.
    pub threshold: f32,
    /// Maximum number of results.
    pub limit: usize,
    /// Treat negative cosine similarity as 0 before thresholding.
    pub floor_negative_scores: bool,
    /// Decimal places kept when scores leave the API.
    pub score_precision: u32,
}

impl Default for MatchingSection {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            limit: DEFAULT_LIMIT,
            floor_negative_scores: true,
            score_precision: DEFAULT_SCORE_PRECISION,
        }
    }
}

impl MatchingSection {
    /// Orchestrator options derived from this section.
    pub fn options(&self) -> MatchOptions {
        MatchOptions {
            threshold: self.threshold,
            limit: self.limit,
            floor_negative_scores: self.floor_negative_scores,
        }
    }
}

/// Embedding model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    /// Model constructed when no artifact exists.
    pub name: String,
    /// Holds the model artifact and the downloaded weights.
    pub artifact_dir: PathBuf,
    /// Inference batch size; `None` lets the library pick.
    pub batch_size: Option<usize>,
    pub show_download_progress: bool,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL.to_string(),
            artifact_dir: PathBuf::from("models"),
            batch_size: None,
            show_download_progress: false,
        }
    }
}

/// User directory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorySection {
    /// JSON file with the user records.
    pub path: PathBuf,
}

impl Default for DirectorySection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/users.json"),
        }
    }
}

impl ServiceConfig {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: ServiceConfig = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let raw = toml::to_string_pretty(self)?;
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.api
            .listen_address
            .parse::<SocketAddr>()
            .map_err(|e| {
                Error::Config(format!(
                    "api.listen_address '{}' is not a socket address: {}",
                    self.api.listen_address, e
                ))
            })?;

        if self.api.request_timeout_secs == 0 {
            return Err(Error::Config(
                "api.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if !(-1.0..=1.0).contains(&self.matching.threshold) {
            return Err(Error::Config(format!(
                "matching.threshold must be within [-1, 1], got {}",
                self.matching.threshold
            )));
        }

        if self.matching.limit == 0 {
            return Err(Error::Config(
                "matching.limit must be greater than 0".to_string(),
            ));
        }

        if self.matching.score_precision > MAX_SCORE_PRECISION {
            return Err(Error::Config(format!(
                "matching.score_precision must be at most {}, got {}",
                MAX_SCORE_PRECISION, self.matching.score_precision
            )));
        }

        if self.model.name.trim().is_empty() {
            return Err(Error::Config("model.name must not be empty".to_string()));
        }

        if !embedding::is_supported_model(&self.model.name) {
            return Err(Error::Config(format!(
                "model.name '{}' is not a supported embedding model (supported: {})",
                self.model.name,
                embedding::supported_models().join(", ")
            )));
        }

        if self.model.batch_size == Some(0) {
            return Err(Error::Config(
                "model.batch_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
