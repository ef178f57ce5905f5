//! Configuration file support for jalak-hijau.
//!
//! Loads optional TOML config from `~/.config/jalak-hijau/config.toml`, or
//! from an explicit `--config` path. Every section has full defaults, so a
//! file only needs the keys it wants to change.

use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};

use crate::case::FeaturedCase;
use crate::cluster::ClusterRules;
use crate::generator::GenerationConfig;
use crate::scoring::RiskWeights;

/// `[output]` section: where tables are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Base name of the transaction tables
    pub base: String,
    /// Base name of the registry tables, also read back by `generate`
    pub registry_base: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            base: "jalak_hijau_transactions".to_string(),
            registry_base: "jalak_hijau_pt_data".to_string(),
        }
    }
}

impl OutputConfig {
    /// `<dir>/<registry_base>.csv`
    pub fn registry_path(&self) -> PathBuf {
        self.dir.join(format!("{}.csv", self.registry_base))
    }

    /// `<dir>/<base>.csv`
    pub fn transactions_path(&self) -> PathBuf {
        self.dir.join(format!("{}.csv", self.base))
    }
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub generation: GenerationConfig,
    pub scoring: RiskWeights,
    pub clusters: ClusterRules,
    pub output: OutputConfig,
    pub featured_case: FeaturedCase,
}

impl Config {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_default()
            .join("jalak-hijau")
            .join("config.toml")
    }

    /// Load config from the default path, falling back to defaults on any error.
    pub fn load() -> Self {
        let path = Self::default_path();
        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "loaded config");
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                Self::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read config, using defaults");
                Self::default()
            }
        }
    }

    /// Load config from an explicit path. Unlike [`Config::load`], any
    /// failure is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .wrap_err_with(|| format!("Failed to parse config: {}", path.display()))?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// `load_from` when a path is given, otherwise `load`.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => Ok(Self::load()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.generation.validate()?;
        self.scoring.validate()?;
        self.clusters.validate()?;
        self.featured_case.validate()?;
        Ok(())
    }
}
