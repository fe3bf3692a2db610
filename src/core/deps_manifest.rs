//! Dependency manifest (`<assembly>.deps.json`) schema.
//!
//! Written by the build beside the artifact. Only the parts needed to find
//! runtime binaries are modeled; everything else in the file is ignored.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Parsed dependency manifest.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyManifest {
    /// Runtime target the build resolved against
    #[serde(default)]
    pub runtime_target: RuntimeTarget,

    /// Per-target library assets, keyed by runtime target name
    #[serde(default)]
    pub targets: BTreeMap<String, BTreeMap<String, TargetLibrary>>,

    /// Library metadata, keyed by `name/version`
    #[serde(default)]
    pub libraries: BTreeMap<String, Library>,
}

/// The `runtimeTarget` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeTarget {
    /// e.g. `.NETCoreApp,Version=v8.0`
    #[serde(default)]
    pub name: String,
}

/// Assets of one library for one target.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetLibrary {
    /// Relative runtime binary entries
    #[serde(default)]
    pub runtime: BTreeMap<String, serde_json::Value>,
}

/// How a library reached the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryKind {
    Package,
    Project,
    #[serde(other)]
    Other,
}

/// Library metadata from the `libraries` section.
#[derive(Debug, Clone, Deserialize)]
pub struct Library {
    #[serde(rename = "type")]
    pub kind: LibraryKind,

    /// Package folder relative to the package root
    #[serde(default)]
    pub path: Option<String>,
}

/// A runtime library resolved from the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestLibrary<'a> {
    /// `name/version` key
    pub id: &'a str,
    pub kind: LibraryKind,
    pub base_path: Option<&'a str>,
    pub runtime_entries: Vec<&'a str>,
}

impl DependencyManifest {
    /// Path of the manifest that belongs to `artifact`.
    pub fn path_for(artifact: &Path) -> PathBuf {
        artifact.with_extension("deps.json")
    }

    /// Load a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read dependency manifest: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("failed to parse dependency manifest: {}", path.display()))
    }

    /// Parse manifest content.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Version of the shared framework named by the runtime target
    /// (`.NETCoreApp,Version=v8.0` gives `8.0`). A runtime identifier
    /// suffix (`/linux-x64`) is not part of the version.
    pub fn framework_version(&self) -> Option<&str> {
        let name = &self.runtime_target.name;
        let (_, version) = name.split_once("Version=")?;
        let version = version.split('/').next().unwrap_or(version);
        let version = version.trim_start_matches('v').trim();
        (!version.is_empty()).then_some(version)
    }

    /// Libraries of the resolved runtime target, in key order.
    pub fn libraries(&self) -> Vec<ManifestLibrary<'_>> {
        let Some(target) = self.targets.get(&self.runtime_target.name) else {
            return Vec::new();
        };

        target
            .iter()
            .filter_map(|(id, assets)| {
                let library = self.libraries.get(id)?;
                Some(ManifestLibrary {
                    id,
                    kind: library.kind,
                    base_path: library.path.as_deref(),
                    runtime_entries: assets.runtime.keys().map(String::as_str).collect(),
                })
            })
            .collect()
    }
}
