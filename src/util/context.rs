//! Global context for typescan operations.
//!
//! Provides centralized access to configuration paths and the host
//! runtime's directories.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use directories::{BaseDirs, ProjectDirs};
use semver::Version;

/// Environment variable overriding the package cache root.
pub const PACKAGE_ROOT_ENV: &str = "NUGET_PACKAGES";

/// Environment variable naming the runtime installation.
pub const DOTNET_ROOT_ENV: &str = "DOTNET_ROOT";

/// Shared framework holding the platform assemblies.
pub const PLATFORM_FRAMEWORK: &str = "Microsoft.NETCore.App";

/// Project directories for typescan
static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("dev", "typescan", "typescan"));

/// Global context containing configuration paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Directory holding the global config file
    config_dir: PathBuf,
}

impl GlobalContext {
    /// Create a new GlobalContext with defaults.
    pub fn new() -> Result<Self> {
        let cwd = env::current_dir().context("failed to get current directory")?;

        let config_dir = match PROJECT_DIRS.as_ref() {
            Some(dirs) => dirs.config_dir().to_path_buf(),
            None => BaseDirs::new()
                .map(|b| b.home_dir().join(".typescan"))
                .unwrap_or_else(|| PathBuf::from(".typescan")),
        };

        Ok(GlobalContext { cwd, config_dir })
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let mut ctx = Self::new()?;
        ctx.cwd = cwd;
        Ok(ctx)
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Get the project-local configuration file path.
    pub fn project_config_path(&self) -> PathBuf {
        self.cwd.join(".typescan").join("config.toml")
    }
}

/// Directories of the runtime hosting the scan.
///
/// Used as the last-resort source of platform assemblies when an artifact
/// carries no usable dependency manifest. Every field is optional; a
/// missing directory simply contributes nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostRuntime {
    /// Runtime installation root (contains `shared/`)
    pub dotnet_root: Option<PathBuf>,
    /// Directory of the host's core library
    pub core_library_dir: Option<PathBuf>,
    /// Directory holding the running runtime's assemblies
    pub runtime_dir: Option<PathBuf>,
    /// Base directory of the current process
    pub base_dir: Option<PathBuf>,
}

impl HostRuntime {
    /// A host with no known directories.
    pub fn none() -> Self {
        Self::default()
    }

    /// Resolve the host from `DOTNET_ROOT`, else the `dotnet` on `PATH`.
    pub fn detect() -> Self {
        let dotnet_root = env::var_os(DOTNET_ROOT_ENV)
            .map(PathBuf::from)
            .filter(|p| p.is_dir())
            .or_else(|| {
                let exe = which::which("dotnet").ok()?;
                let exe = exe.canonicalize().unwrap_or(exe);
                exe.parent().map(Path::to_path_buf)
            });

        let base_dir = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));

        let host = Self::none()
            .with_dotnet_root(dotnet_root)
            .with_base_dir(base_dir);
        tracing::debug!("host runtime: {:?}", host);
        host
    }

    /// Set the runtime root. The core library and runtime directories are
    /// the newest installed platform framework under it.
    pub fn with_dotnet_root(mut self, root: Option<PathBuf>) -> Self {
        let framework = root
            .as_deref()
            .and_then(|r| newest_version_dir(&r.join("shared").join(PLATFORM_FRAMEWORK), None));
        self.core_library_dir = framework.clone();
        self.runtime_dir = framework;
        self.dotnet_root = root;
        self
    }

    pub fn with_base_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.base_dir = dir;
        self
    }

    /// Shared framework directory for a `major.minor` version, picking the
    /// newest installed patch.
    pub fn framework_dir(&self, version: &str) -> Option<PathBuf> {
        let root = self.dotnet_root.as_ref()?;
        newest_version_dir(&root.join("shared").join(PLATFORM_FRAMEWORK), Some(version))
    }
}

/// The newest semver-named subdirectory of `parent`, optionally limited to
/// a `major.minor` prefix.
pub fn newest_version_dir(parent: &Path, major_minor: Option<&str>) -> Option<PathBuf> {
    let wanted = match major_minor {
        Some(v) => {
            let mut parts = v.split('.');
            let major: u64 = parts.next()?.parse().ok()?;
            let minor: u64 = parts.next().unwrap_or("0").parse().ok()?;
            Some((major, minor))
        }
        None => None,
    };

    std::fs::read_dir(parent)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let version = Version::parse(&entry.file_name().to_string_lossy()).ok()?;
            Some((version, entry.path()))
        })
        .filter(|(v, _)| wanted.map_or(true, |(major, minor)| v.major == major && v.minor == minor))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, path)| path)
}

/// Package cache root: `NUGET_PACKAGES`, else `~/.nuget/packages`.
pub fn package_root_from_env() -> Option<PathBuf> {
    if let Some(root) = env::var_os(PACKAGE_ROOT_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(root));
    }
    BaseDirs::new().map(|b| b.home_dir().join(".nuget").join("packages"))
}
