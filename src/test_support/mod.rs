//! Test utilities and mocks for typescan unit tests.
//!
//! Provides a writer for synthetic managed modules, project fixtures, and
//! a recording stand-in for the external build tool.
//!
//! # Example
//!
//! ```rust,ignore
//! use typescan::test_support::{write_project, FakeBuild};
//!
//! #[test]
//! fn test_example() {
//!     let tmp = tempfile::TempDir::new().unwrap();
//!     let project = write_project(tmp.path(), "App", "net8.0");
//!     let build = FakeBuild::succeeding();
//!     // Resolve `project` through an ArtifactResolver backed by `build`...
//! }
//! ```

pub mod assembly;
pub mod fixtures;

use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;

use crate::builder::invoker::{BuildInvoker, BuildOutput, BuildStatus};
use crate::core::descriptor::ProjectDescriptor;
use crate::util::fs::write_bytes;
use crate::util::process::CancellationToken;

pub use assembly::{AssemblyBuilder, TypeHandle};
pub use fixtures::*;

/// Mock build tool.
///
/// A successful build writes the artifact where the descriptor says it
/// belongs, so resolution sees exactly what a real build leaves behind.
#[derive(Debug, Default)]
pub struct FakeBuild {
    failure: Option<String>,
    skip_artifact: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeBuild {
    /// Builds that succeed and produce the artifact.
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// Builds that fail with `message` on stdout, as MSBuild reports errors.
    pub fn failing(message: impl Into<String>) -> Self {
        FakeBuild {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Report success without writing anything.
    pub fn without_artifact(mut self) -> Self {
        self.skip_artifact = true;
        self
    }

    /// Number of builds run so far.
    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Configuration of the most recent build.
    pub fn last_configuration(&self) -> Option<String> {
        self.calls.lock().unwrap().last().cloned()
    }
}

impl BuildInvoker for FakeBuild {
    fn build(
        &self,
        descriptor: &Path,
        configuration: &str,
        cancel: &CancellationToken,
    ) -> Result<BuildStatus> {
        if cancel.is_cancelled() {
            return Ok(BuildStatus::Cancelled);
        }
        self.calls.lock().unwrap().push(configuration.to_string());

        if let Some(message) = &self.failure {
            return Ok(BuildStatus::Finished(BuildOutput {
                success: false,
                stdout: message.clone(),
                stderr: String::new(),
            }));
        }

        if !self.skip_artifact {
            let project = ProjectDescriptor::load(descriptor)?;
            let location = project.artifact_location(configuration);
            let image = AssemblyBuilder::new(project.assembly_name()).to_bytes();
            write_bytes(location.path(), image)?;
        }

        Ok(BuildStatus::Finished(BuildOutput {
            success: true,
            stdout: "Build succeeded.".to_string(),
            stderr: String::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fake_build_writes_artifact() {
        let tmp = TempDir::new().unwrap();
        let project = write_project(tmp.path(), "Lib", "net8.0");
        let build = FakeBuild::succeeding();

        let status = build
            .build(&project, "Debug", &CancellationToken::new())
            .unwrap();
        assert!(matches!(status, BuildStatus::Finished(ref out) if out.success));
        assert!(tmp.path().join("Lib/bin/Debug/net8.0/Lib.dll").is_file());
        assert_eq!(build.calls(), 1);
    }

    #[test]
    fn test_fake_build_honors_cancellation() {
        let build = FakeBuild::succeeding();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let status = build.build(Path::new("x.csproj"), "Debug", &cancel).unwrap();
        assert_eq!(status, BuildStatus::Cancelled);
        assert_eq!(build.calls(), 0);
    }
}
