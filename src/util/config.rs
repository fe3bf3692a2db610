//! Configuration file support for typescan.
//!
//! Two configuration file locations are read:
//! - Global: `<config dir>/config.toml` - User-wide defaults
//! - Project: `.typescan/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ops::resolve_artifact::BuildStrategy;

/// typescan configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Artifact resolution settings
    pub resolve: ResolveConfig,

    /// Type scan settings
    pub scan: ScanConfig,
}

/// Artifact resolution configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ResolveConfig {
    /// Build strategy (never, auto, always)
    pub strategy: Option<BuildStrategy>,

    /// Build configuration name (Debug, Release, ...)
    pub configuration: Option<String>,

    /// Relative paths the staleness check is limited to
    pub check_paths: Option<Vec<PathBuf>>,

    /// Also compare individual file timestamps
    pub check_for_edit: Option<bool>,
}

/// Type scan configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScanConfig {
    /// Assembly anchoring the fundamental types
    pub core_library: Option<String>,

    /// Package cache root, overriding the environment
    pub package_root: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        let Config { resolve, scan } = other;

        if resolve.strategy.is_some() {
            self.resolve.strategy = resolve.strategy;
        }
        if resolve.configuration.is_some() {
            self.resolve.configuration = resolve.configuration;
        }
        if resolve.check_paths.is_some() {
            self.resolve.check_paths = resolve.check_paths;
        }
        if resolve.check_for_edit.is_some() {
            self.resolve.check_for_edit = resolve.check_for_edit;
        }

        if scan.core_library.is_some() {
            self.scan.core_library = scan.core_library;
        }
        if scan.package_root.is_some() {
            self.scan.package_root = scan.package_root;
        }
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.typescan/config.toml)
/// 2. Global config
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();
    config.merge(Config::load_or_default(global_path));
    config.merge(Config::load_or_default(project_path));
    config
}
