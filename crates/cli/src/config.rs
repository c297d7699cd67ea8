//! Configuration loading from warden.toml.

use audit::WriterConfig;
use policy::{PolicyEngine, Vocabulary};
use ratelimit::{RateLimitConfig, RateLimiter};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Resource vocabulary for the policy engine.
    #[serde(default)]
    pub policy: Vocabulary,

    /// Login throttling defaults.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Audit trail storage.
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Audit storage configuration.
#[derive(Debug, Deserialize)]
pub struct AuditConfig {
    /// SQLite database file.
    #[serde(default = "default_database")]
    pub database: PathBuf,

    #[serde(flatten)]
    pub writer: WriterConfig,
}

fn default_database() -> PathBuf {
    PathBuf::from("audit.db")
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            writer: WriterConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load `path` if it exists, otherwise use defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Build the policy engine, validating the vocabulary.
    pub fn policy_engine(&self) -> policy::Result<PolicyEngine> {
        PolicyEngine::new(self.policy.clone())
    }

    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.rate_limit)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),
}
