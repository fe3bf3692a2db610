//! Project descriptor parsing and artifact location.
//!
//! A descriptor is an MSBuild project file. Only a handful of property
//! elements matter here; they are matched by local name so the legacy
//! MSBuild namespace declaration makes no difference.

use std::path::{Path, PathBuf};

use roxmltree::Document;

use crate::core::errors::{Error, Result};

/// File extension of a compiled managed module.
pub const ARTIFACT_EXTENSION: &str = "dll";

/// Output root used when the descriptor sets no `BaseOutputPath`.
pub const DEFAULT_BASE_OUTPUT: &str = "bin";

/// Settings read from a project descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDescriptor {
    /// Absolute path of the descriptor file
    path: PathBuf,

    /// Target platform monikers, in declaration order (never empty)
    platform_monikers: Vec<String>,

    /// `AssemblyName` override
    assembly_name_override: Option<String>,

    /// `OutputPath` override
    output_path_override: Option<String>,

    /// `BaseOutputPath` override
    base_output_override: Option<String>,
}

impl ProjectDescriptor {
    /// Read and parse a descriptor file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::resolution_caused_by(
                format!("failed to read project file `{}`", path.display()),
                e,
            )
        })?;
        Self::parse(path, &content)
    }

    /// Parse descriptor content that was read from `path`.
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let doc = Document::parse(content).map_err(|e| {
            Error::resolution_caused_by(
                format!("failed to parse project file `{}`", path.display()),
                e,
            )
        })?;

        let property = |local_name: &str| -> Option<String> {
            doc.descendants()
                .filter(|n| n.is_element() && n.tag_name().name() == local_name)
                .find_map(|n| {
                    n.text()
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                })
        };

        let platform_monikers = match property("TargetFramework") {
            Some(single) => vec![single],
            None => property("TargetFrameworks")
                .map(|multi| {
                    multi
                        .split(';')
                        .map(str::trim)
                        .filter(|m| !m.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        };

        if platform_monikers.is_empty() {
            return Err(Error::resolution(format!(
                "project file `{}` declares no TargetFramework or TargetFrameworks",
                path.display()
            )));
        }

        Ok(ProjectDescriptor {
            path: path.to_path_buf(),
            platform_monikers,
            assembly_name_override: property("AssemblyName"),
            output_path_override: property("OutputPath"),
            base_output_override: property("BaseOutputPath"),
        })
    }

    /// Path of the descriptor file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the descriptor.
    pub fn project_dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }

    /// All declared platform monikers.
    pub fn platform_monikers(&self) -> &[String] {
        &self.platform_monikers
    }

    /// The moniker builds and lookups use: the first declared one.
    pub fn platform_moniker(&self) -> &str {
        &self.platform_monikers[0]
    }

    /// Assembly name, defaulting to the descriptor's file stem.
    pub fn assembly_name(&self) -> String {
        self.assembly_name_override.clone().unwrap_or_else(|| {
            self.path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }

    /// Directory the build writes the artifact into for `configuration`.
    pub fn output_dir(&self, configuration: &str) -> PathBuf {
        if let Some(ref output) = self.output_path_override {
            return self.relative_to_project(output);
        }

        let base = self
            .base_output_override
            .as_deref()
            .unwrap_or(DEFAULT_BASE_OUTPUT);
        self.relative_to_project(base)
            .join(configuration)
            .join(self.platform_moniker())
    }

    /// Expected artifact location for `configuration`.
    pub fn artifact_location(&self, configuration: &str) -> ArtifactLocation {
        let file_name = format!("{}.{}", self.assembly_name(), ARTIFACT_EXTENSION);
        ArtifactLocation(self.output_dir(configuration).join(file_name))
    }

    fn relative_to_project(&self, value: &str) -> PathBuf {
        // MSBuild paths use backslashes even in cross-platform projects.
        let normalized: PathBuf = value
            .split(['\\', '/'])
            .filter(|c| !c.is_empty() && *c != ".")
            .collect();
        let value_path = Path::new(value);
        if value_path.is_absolute() {
            value_path.to_path_buf()
        } else {
            self.project_dir().join(normalized)
        }
    }
}

/// Absolute path where a project's compiled artifact is expected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactLocation(PathBuf);

impl ArtifactLocation {
    /// The artifact path.
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Whether the artifact currently exists.
    pub fn exists(&self) -> bool {
        self.0.is_file()
    }

    /// Take the inner path.
    pub fn into_path(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for ArtifactLocation {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}
