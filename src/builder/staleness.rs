//! Timestamp-based staleness detection.
//!
//! An artifact is fresh when nothing that feeds it is newer than it. Two
//! tiers are checked:
//!
//! - Directory timestamps. Adding, removing or renaming an entry bumps the
//!   containing directory's modification time, so walking directories
//!   alone catches structural changes without opening a single file.
//! - File timestamps (opt-in). In-place edits only touch the file itself,
//!   so catching them requires enumerating every file.
//!
//! Filesystems that do not bump directory timestamps on entry removal will
//! under-report deletions when only the first tier runs.

use std::ffi::OsStr;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::{DirEntry, WalkDir};

use crate::core::errors::{Error, Result};

/// Build-intermediate directories. Never a staleness source.
pub const INTERMEDIATE_DIRS: [&str; 2] = ["bin", "obj"];

/// Which parts of the project tree are compared against the artifact.
#[derive(Debug, Clone, Default)]
pub struct StalenessCheck {
    /// Paths relative to the project directory. `None` checks the whole tree.
    pub paths: Option<Vec<PathBuf>>,

    /// Also compare every file's timestamp, not just directories'.
    pub check_for_edit: bool,
}

impl StalenessCheck {
    /// Check the whole project tree.
    pub fn whole_tree() -> Self {
        StalenessCheck::default()
    }

    /// Restrict the check to `paths`, relative to the project directory.
    pub fn scoped<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        StalenessCheck {
            paths: Some(paths.into_iter().map(Into::into).collect()),
            check_for_edit: false,
        }
    }

    /// Enable or disable per-file comparison.
    pub fn check_for_edit(mut self, check_for_edit: bool) -> Self {
        self.check_for_edit = check_for_edit;
        self
    }

    /// Decide whether `artifact` is out of date with respect to `descriptor`
    /// and the source tree around it.
    pub fn is_stale(&self, descriptor: &Path, artifact: &Path) -> Result<bool> {
        let artifact_time = match std::fs::metadata(artifact) {
            Ok(meta) => modified(artifact, &meta)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("artifact {} does not exist", artifact.display());
                return Ok(true);
            }
            Err(e) => return Err(staleness_error(artifact, e)),
        };

        let descriptor_meta =
            std::fs::metadata(descriptor).map_err(|e| staleness_error(descriptor, e))?;
        if modified(descriptor, &descriptor_meta)? > artifact_time {
            tracing::debug!("project file {} changed", descriptor.display());
            return Ok(true);
        }

        let project_dir = descriptor.parent().unwrap_or(Path::new("."));
        for root in self.roots(project_dir) {
            if self.root_is_stale(&root, artifact_time)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn roots(&self, project_dir: &Path) -> Vec<PathBuf> {
        match self.paths {
            Some(ref paths) => paths.iter().map(|p| project_dir.join(p)).collect(),
            None => vec![project_dir.to_path_buf()],
        }
    }

    fn root_is_stale(&self, root: &Path, artifact_time: SystemTime) -> Result<bool> {
        let meta = match std::fs::metadata(root) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("skipping missing check path {}", root.display());
                return Ok(false);
            }
            Err(e) => return Err(staleness_error(root, e)),
        };

        if meta.is_file() {
            let newer = modified(root, &meta)? > artifact_time;
            if newer {
                tracing::debug!("source file {} changed", root.display());
            }
            return Ok(newer);
        }

        // A scoped path naming an intermediate directory is skipped; the
        // project directory itself may carry any name.
        if self.paths.is_some() && is_intermediate(root.file_name()) {
            return Ok(false);
        }

        if let Some(dir) = newer_entry(root, artifact_time, |e| e.file_type().is_dir())? {
            tracing::debug!("directory {} changed", dir.display());
            return Ok(true);
        }

        if self.check_for_edit {
            if let Some(file) = newer_entry(root, artifact_time, |e| e.file_type().is_file())? {
                tracing::debug!("source file {} was edited", file.display());
                return Ok(true);
            }
        }

        Ok(false)
    }
}

/// Convenience wrapper over [`StalenessCheck::is_stale`].
pub fn is_stale(
    descriptor: &Path,
    artifact: &Path,
    paths_to_check: Option<&[PathBuf]>,
    check_for_edit: bool,
) -> Result<bool> {
    StalenessCheck {
        paths: paths_to_check.map(<[PathBuf]>::to_vec),
        check_for_edit,
    }
    .is_stale(descriptor, artifact)
}

/// First entry under `root` accepted by `select` whose timestamp is newer
/// than `than`. Intermediate directories below `root` are pruned at every
/// depth.
fn newer_entry(
    root: &Path,
    than: SystemTime,
    select: impl Fn(&DirEntry) -> bool,
) -> Result<Option<PathBuf>> {
    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            !(e.depth() > 0 && e.file_type().is_dir() && is_intermediate(Some(e.file_name())))
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            let io = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
            staleness_error(&path, io)
        })?;

        if !select(&entry) {
            continue;
        }

        let meta = entry
            .metadata()
            .map_err(|e| staleness_error(entry.path(), e.into()))?;
        if modified(entry.path(), &meta)? > than {
            return Ok(Some(entry.into_path()));
        }
    }

    Ok(None)
}

fn is_intermediate(name: Option<&OsStr>) -> bool {
    name.and_then(OsStr::to_str)
        .map(|n| INTERMEDIATE_DIRS.iter().any(|d| n.eq_ignore_ascii_case(d)))
        .unwrap_or(false)
}

fn modified(path: &Path, meta: &Metadata) -> Result<SystemTime> {
    meta.modified().map_err(|e| staleness_error(path, e))
}

fn staleness_error(path: &Path, source: std::io::Error) -> Error {
    Error::Staleness {
        path: path.to_path_buf(),
        source,
    }
}
