//! Dependency closure: every binary the metadata loader may need to resolve
//! references out of a target module.
//!
//! Sources are independent and best-effort. A source that cannot be read
//! contributes nothing; an incomplete set only surfaces later, as a load
//! failure for whatever reference could not be resolved.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::core::deps_manifest::{DependencyManifest, LibraryKind};
use crate::core::descriptor::ARTIFACT_EXTENSION;
use crate::util::context::{package_root_from_env, HostRuntime};
use crate::util::fs::{binaries_in, stem_key};

/// Deduplicated binary paths, in insertion order.
///
/// Paths compare case-insensitively. Lookups by assembly simple name use
/// the file stem; the first path inserted for a stem wins.
#[derive(Debug, Clone, Default)]
pub struct SearchLocationSet {
    paths: IndexMap<String, PathBuf>,
    by_stem: HashMap<String, usize>,
}

impl SearchLocationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path. Returns false if it was already present.
    pub fn insert(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        let key = path.to_string_lossy().to_lowercase();
        if self.paths.contains_key(&key) {
            return false;
        }
        let (index, _) = self.paths.insert_full(key, path.clone());
        if let Some(stem) = stem_key(&path) {
            self.by_stem.entry(stem).or_insert(index);
        }
        true
    }

    pub fn extend<I: IntoIterator<Item = PathBuf>>(&mut self, paths: I) {
        for path in paths {
            self.insert(path);
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains_key(&path.to_string_lossy().to_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.values().map(PathBuf::as_path)
    }

    /// Binary providing the assembly with the given simple name.
    pub fn find_assembly(&self, simple_name: &str) -> Option<&Path> {
        let index = *self.by_stem.get(&simple_name.to_lowercase())?;
        self.paths.get_index(index).map(|(_, p)| p.as_path())
    }
}

/// Where the closure looks besides the artifact's own directory.
#[derive(Debug, Clone, Default)]
pub struct ClosureSettings {
    /// Last-resort source of platform assemblies
    pub host: HostRuntime,
    /// Package cache root for package-kind manifest entries
    pub package_root: Option<PathBuf>,
}

impl ClosureSettings {
    /// Host and package root as found in the environment.
    pub fn detect() -> Self {
        ClosureSettings {
            host: HostRuntime::detect(),
            package_root: package_root_from_env(),
        }
    }

    pub fn with_host(mut self, host: HostRuntime) -> Self {
        self.host = host;
        self
    }

    pub fn with_package_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.package_root = Some(root.into());
        self
    }
}

/// Ordered strategies for locating platform assemblies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlatformSource {
    /// Shared framework matching the manifest's runtime target
    ManifestFramework,
    /// Directory of the host's core library
    CoreLibraryDir,
    /// The host runtime's binary directory
    RuntimeDir,
    /// Base directory of this process
    BaseDir,
}

impl PlatformSource {
    const FALLBACKS: [PlatformSource; 3] = [
        PlatformSource::CoreLibraryDir,
        PlatformSource::RuntimeDir,
        PlatformSource::BaseDir,
    ];

    fn locate(
        self,
        manifest: Option<&DependencyManifest>,
        host: &HostRuntime,
    ) -> Option<Vec<PathBuf>> {
        let dir = match self {
            PlatformSource::ManifestFramework => {
                host.framework_dir(manifest?.framework_version()?)?
            }
            PlatformSource::CoreLibraryDir => host.core_library_dir.clone()?,
            PlatformSource::RuntimeDir => host.runtime_dir.clone()?,
            PlatformSource::BaseDir => host.base_dir.clone()?,
        };
        let found = binaries_in(&dir, ARTIFACT_EXTENSION).ok()?;
        (!found.is_empty()).then_some(found)
    }
}

/// Assemble the search locations for `artifact`.
pub fn collect(artifact: &Path, settings: &ClosureSettings) -> SearchLocationSet {
    let artifact_dir = artifact.parent().unwrap_or(Path::new("."));
    let manifest_path = DependencyManifest::path_for(artifact);
    let manifest = if manifest_path.is_file() {
        match DependencyManifest::load(&manifest_path) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                warn!("ignoring dependency manifest: {:#}", e);
                None
            }
        }
    } else {
        None
    };

    let mut set = SearchLocationSet::new();

    // 1. Platform assemblies
    match PlatformSource::ManifestFramework.locate(manifest.as_ref(), &settings.host) {
        Some(paths) => {
            debug!("using {} platform assemblies from the shared framework", paths.len());
            set.extend(paths);
        }
        None => {
            for source in PlatformSource::FALLBACKS {
                match source.locate(None, &settings.host) {
                    Some(paths) => set.extend(paths),
                    None => debug!("platform source {:?} contributed nothing", source),
                }
            }
        }
    }

    // 2. Output-directory siblings
    match binaries_in(artifact_dir, ARTIFACT_EXTENSION) {
        Ok(paths) => set.extend(paths),
        Err(e) => debug!("cannot list {}: {:#}", artifact_dir.display(), e),
    }

    // 3. Manifest-declared dependencies
    if let Some(manifest) = &manifest {
        set.extend(manifest_entries(manifest, artifact_dir, settings.package_root.as_deref()));
    }

    debug!("search locations for {}: {}", artifact.display(), set.len());
    set
}

/// Absolute, existing binaries declared by the manifest's runtime target.
fn manifest_entries(
    manifest: &DependencyManifest,
    artifact_dir: &Path,
    package_root: Option<&Path>,
) -> Vec<PathBuf> {
    let mut out = Vec::new();

    for library in manifest.libraries() {
        for entry in &library.runtime_entries {
            let path = match library.kind {
                LibraryKind::Package => {
                    let Some(root) = package_root else {
                        continue;
                    };
                    let base = library
                        .base_path
                        .map(str::to_string)
                        .unwrap_or_else(|| library.id.to_lowercase());
                    root.join(base).join(entry)
                }
                LibraryKind::Project => match Path::new(entry).file_name() {
                    Some(name) => artifact_dir.join(name),
                    None => continue,
                },
                LibraryKind::Other => continue,
            };

            if path.is_file() {
                out.push(path);
            } else {
                debug!("manifest entry {} of {} not found", path.display(), library.id);
            }
        }
    }

    out
}
