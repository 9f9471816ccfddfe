//! Configuration — `gwlab.toml`, every key optional.
//!
//! ```toml
//! horizon = 7
//! leading_period = 7
//!
//! [bootstrap]
//! n_simulations = 1000
//! confidence_level = 0.95
//! seed = 42
//!
//! [diagnostics]
//! acf_lags = 7
//! histogram_bins = 10
//!
//! [assistant]
//! base_url = "https://assistant.example"
//! timeout_secs = 60
//! client_key_env = "GWLAB_CLIENT_KEY"
//!
//! [storage]
//! session_path = "gwlab-session.json"
//! journal_path = "gwlab-theories.jsonl"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use gwlab_core::forecast::DEFAULT_HORIZON;
use gwlab_core::interval::BootstrapConfig;

use crate::compliance::ComplianceThresholds;
use crate::evaluation::CheckConfig;

pub const DEFAULT_CONFIG_PATH: &str = "gwlab.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("environment variable {0} is not set")]
    MissingClientKey(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub acf_lags: usize,
    pub histogram_bins: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            acf_lags: 7,
            histogram_bins: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Name of the environment variable holding the client key.
    pub client_key_env: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: 60,
            client_key_env: "GWLAB_CLIENT_KEY".into(),
        }
    }
}

impl AssistantConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn client_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.client_key_env)
            .map_err(|_| ConfigError::MissingClientKey(self.client_key_env.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub session_path: PathBuf,
    pub journal_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            session_path: PathBuf::from("gwlab-session.json"),
            journal_path: PathBuf::from("gwlab-theories.jsonl"),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GwlabConfig {
    pub horizon: usize,
    pub leading_period: usize,
    pub bootstrap: BootstrapConfig,
    pub diagnostics: DiagnosticsConfig,
    pub compliance: ComplianceThresholds,
    pub assistant: AssistantConfig,
    pub storage: StorageConfig,
}

impl Default for GwlabConfig {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_HORIZON,
            leading_period: 7,
            bootstrap: BootstrapConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            compliance: ComplianceThresholds::default(),
            assistant: AssistantConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl GwlabConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Load `path` when it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizon == 0 {
            return Err(ConfigError::Invalid("horizon must be at least 1".into()));
        }
        let c = self.bootstrap.confidence_level;
        if !(c > 0.0 && c < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "bootstrap.confidence_level must be in (0, 1), got {c}"
            )));
        }
        if self.bootstrap.n_simulations == 0 {
            return Err(ConfigError::Invalid("bootstrap.n_simulations must be at least 1".into()));
        }
        if self.diagnostics.histogram_bins == 0 {
            return Err(ConfigError::Invalid(
                "diagnostics.histogram_bins must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn check_config(&self) -> CheckConfig {
        CheckConfig {
            horizon: self.horizon,
            leading_period: self.leading_period,
            bootstrap: self.bootstrap.clone(),
            acf_lags: self.diagnostics.acf_lags,
            histogram_bins: self.diagnostics.histogram_bins,
        }
    }
}
