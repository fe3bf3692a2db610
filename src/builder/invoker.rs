//! The external build tool, seen only through its result.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::util::process::{find_executable, CancellationToken, ProcessBuilder};

/// Captured result of one build run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutput {
    /// Whether the tool reported success
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl BuildOutput {
    /// The text most useful for diagnosing a failed build.
    ///
    /// MSBuild writes errors to stdout, so stderr alone is often empty.
    pub fn error_text(&self) -> &str {
        if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// How a build run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    /// The tool ran to completion (successfully or not).
    Finished(BuildOutput),
    /// The caller's cancellation token fired during the wait.
    Cancelled,
}

/// Something that can build a project descriptor.
pub trait BuildInvoker {
    /// Build `descriptor` in `configuration`, honoring `cancel` while waiting.
    ///
    /// `Err` means the tool could not be run at all.
    fn build(
        &self,
        descriptor: &Path,
        configuration: &str,
        cancel: &CancellationToken,
    ) -> Result<BuildStatus>;
}

/// Builds through `dotnet build`.
#[derive(Debug, Clone)]
pub struct DotnetCli {
    program: PathBuf,
}

impl DotnetCli {
    /// Use the `dotnet` found on `PATH`.
    pub fn from_path() -> Result<Self> {
        let program = find_executable("dotnet")
            .context("`dotnet` was not found on PATH; install the .NET SDK")?;
        Ok(DotnetCli { program })
    }

    /// Use an explicit `dotnet` executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        DotnetCli {
            program: program.into(),
        }
    }

    fn command(&self, descriptor: &Path, configuration: &str) -> ProcessBuilder {
        let mut pb = ProcessBuilder::new(&self.program)
            .arg("build")
            .arg(descriptor)
            .args(["-c", configuration, "-nologo"])
            .env("DOTNET_NOLOGO", "1")
            .env("DOTNET_CLI_TELEMETRY_OPTOUT", "1");
        if let Some(dir) = descriptor.parent().filter(|d| !d.as_os_str().is_empty()) {
            pb = pb.cwd(dir);
        }
        pb
    }
}

impl BuildInvoker for DotnetCli {
    fn build(
        &self,
        descriptor: &Path,
        configuration: &str,
        cancel: &CancellationToken,
    ) -> Result<BuildStatus> {
        let pb = self.command(descriptor, configuration);
        tracing::debug!("running `{}`", pb.display_command());

        let Some(output) = pb.exec_cancellable(cancel)? else {
            return Ok(BuildStatus::Cancelled);
        };

        Ok(BuildStatus::Finished(BuildOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }))
    }
}
