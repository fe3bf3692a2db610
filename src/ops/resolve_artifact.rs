//! Artifact resolution: locate, check freshness, build when allowed.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::builder::invoker::{BuildInvoker, BuildStatus};
use crate::builder::staleness::StalenessCheck;
use crate::core::descriptor::ProjectDescriptor;
use crate::core::errors::{Error, Result};
use crate::util::process::CancellationToken;

/// When the artifact may be (re)built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStrategy {
    /// Never build; a stale artifact is an error.
    Never,
    /// Build only when the artifact is stale.
    #[default]
    Auto,
    /// Build on every resolution.
    Always,
}

impl fmt::Display for BuildStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStrategy::Never => write!(f, "never"),
            BuildStrategy::Auto => write!(f, "auto"),
            BuildStrategy::Always => write!(f, "always"),
        }
    }
}

impl FromStr for BuildStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "never" => Ok(BuildStrategy::Never),
            "auto" => Ok(BuildStrategy::Auto),
            "always" => Ok(BuildStrategy::Always),
            other => Err(format!(
                "unknown build strategy `{}` (expected never, auto or always)",
                other
            )),
        }
    }
}

/// A resolved artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult {
    /// Absolute artifact path
    pub artifact_path: PathBuf,

    /// Captured build output; present exactly when this call built the artifact
    pub build_output: Option<String>,
}

impl ResolutionResult {
    /// Whether this call built the artifact.
    pub fn was_built(&self) -> bool {
        self.build_output.is_some()
    }
}

/// Outcome of a resolution call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    Resolved(ResolutionResult),
    /// The cancellation token fired while a build was running.
    Cancelled,
}

impl ResolveOutcome {
    /// The result, if the call was not cancelled.
    pub fn resolved(self) -> Option<ResolutionResult> {
        match self {
            ResolveOutcome::Resolved(result) => Some(result),
            ResolveOutcome::Cancelled => None,
        }
    }
}

type BuildStartCallback = Arc<dyn Fn() + Send + Sync>;

/// Resolves a project file to an up-to-date artifact.
///
/// Not safe to run concurrently against the same project: two calls may
/// both decide to build, or read a partially written artifact. Callers
/// that need concurrency must serialize per project.
pub struct ArtifactResolver<'a> {
    invoker: &'a dyn BuildInvoker,
    strategy: BuildStrategy,
    configuration: String,
    check: StalenessCheck,
    on_build_start: Option<BuildStartCallback>,
}

impl<'a> ArtifactResolver<'a> {
    /// Create a resolver with the `auto` strategy and `Debug` configuration.
    pub fn new(invoker: &'a dyn BuildInvoker) -> Self {
        ArtifactResolver {
            invoker,
            strategy: BuildStrategy::default(),
            configuration: "Debug".to_string(),
            check: StalenessCheck::whole_tree(),
            on_build_start: None,
        }
    }

    /// Set the build strategy.
    pub fn strategy(mut self, strategy: BuildStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the build configuration name.
    pub fn configuration(mut self, configuration: impl Into<String>) -> Self {
        self.configuration = configuration.into();
        self
    }

    /// Restrict staleness checks to paths relative to the project directory.
    pub fn check_paths(mut self, paths: Option<Vec<PathBuf>>) -> Self {
        self.check.paths = paths;
        self
    }

    /// Compare individual file timestamps as well as directories'.
    pub fn check_for_edit(mut self, check_for_edit: bool) -> Self {
        self.check.check_for_edit = check_for_edit;
        self
    }

    /// Called once, right before a build starts.
    pub fn on_build_start(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_build_start = Some(Arc::new(callback));
        self
    }

    /// Resolve `project_path` without a way to cancel.
    pub fn resolve(&self, project_path: &str) -> Result<ResolutionResult> {
        match self.resolve_cancellable(project_path, &CancellationToken::new())? {
            ResolveOutcome::Resolved(result) => Ok(result),
            // An unfired token cannot cancel.
            ResolveOutcome::Cancelled => Err(Error::resolution("build was cancelled")),
        }
    }

    /// Resolve `project_path`, aborting a running build when `cancel` fires.
    pub fn resolve_cancellable(
        &self,
        project_path: &str,
        cancel: &CancellationToken,
    ) -> Result<ResolveOutcome> {
        Error::require_non_blank(project_path, "project path")?;

        let descriptor_path = absolute(Path::new(project_path.trim()))?;
        if !descriptor_path.is_file() {
            return Err(Error::resolution(format!(
                "project file not found: {}",
                descriptor_path.display()
            )));
        }

        let descriptor = ProjectDescriptor::load(&descriptor_path)?;
        let location = descriptor.artifact_location(&self.configuration);
        let stale = self.check.is_stale(&descriptor_path, location.path())?;
        tracing::debug!(
            "artifact {} is {} (strategy: {})",
            location.path().display(),
            if stale { "stale" } else { "fresh" },
            self.strategy
        );

        let must_build = match (self.strategy, stale) {
            (BuildStrategy::Never, true) => {
                return Err(Error::resolution(format!(
                    "artifact `{}` is missing or out of date and automatic builds are disabled; \
                     build `{}` manually",
                    location.path().display(),
                    descriptor_path.display()
                )));
            }
            (BuildStrategy::Always, _) | (BuildStrategy::Auto, true) => true,
            _ => false,
        };

        if !must_build {
            return Ok(ResolveOutcome::Resolved(ResolutionResult {
                artifact_path: location.into_path(),
                build_output: None,
            }));
        }

        if let Some(ref callback) = self.on_build_start {
            callback();
        }
        tracing::info!(
            "building {} ({})",
            descriptor_path.display(),
            self.configuration
        );

        let status = self
            .invoker
            .build(&descriptor_path, &self.configuration, cancel)
            .map_err(|e| {
                Error::resolution_caused_by(
                    format!("failed to run the build for `{}`", descriptor_path.display()),
                    e,
                )
            })?;

        let output = match status {
            BuildStatus::Cancelled => return Ok(ResolveOutcome::Cancelled),
            BuildStatus::Finished(output) => output,
        };

        if !output.success {
            return Err(Error::resolution_with_details(
                format!("build of `{}` failed", descriptor_path.display()),
                output.error_text(),
            ));
        }

        if !location.exists() {
            return Err(Error::resolution(format!(
                "build of `{}` succeeded but no artifact was found at `{}`",
                descriptor_path.display(),
                location.path().display()
            )));
        }

        Ok(ResolveOutcome::Resolved(ResolutionResult {
            artifact_path: location.into_path(),
            build_output: Some(output.stdout),
        }))
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| {
        Error::resolution_caused_by(format!("invalid project path `{}`", path.display()), e)
    })
}
