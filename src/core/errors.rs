//! Error taxonomy shared by artifact resolution and type scanning.

use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Boxed source error carried by resolution failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Every failure surfaced by the library.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum Error {
    /// A required string input was blank. Raised before any I/O.
    #[error("{what} must not be empty")]
    #[diagnostic(code(typescan::validation))]
    Validation { what: &'static str },

    /// The artifact could not be located, built, or trusted.
    #[error("{message}")]
    #[diagnostic(code(typescan::resolve::failed))]
    Resolution {
        message: String,
        /// Captured build output or other diagnostic text
        details: Option<String>,
        #[source]
        source: Option<BoxError>,
    },

    /// Walking the source tree for timestamps failed.
    #[error("failed to check staleness of `{}`", path.display())]
    #[diagnostic(code(typescan::resolve::staleness))]
    Staleness {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The target module (or a hard dependency) could not be loaded.
    #[error("failed to load metadata from `{}`: {message}", path.display())]
    #[diagnostic(code(typescan::scan::load_failed))]
    Scan {
        path: PathBuf,
        message: String,
        /// Error text of the failing dependency, when one is known
        inner: Option<String>,
    },
}

/// Result alias for library operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn resolution(message: impl Into<String>) -> Self {
        Error::Resolution {
            message: message.into(),
            details: None,
            source: None,
        }
    }

    pub(crate) fn resolution_with_details(
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Error::Resolution {
            message: message.into(),
            details: Some(details.into()),
            source: None,
        }
    }

    pub(crate) fn resolution_caused_by(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Error::Resolution {
            message: message.into(),
            details: None,
            source: Some(source.into()),
        }
    }

    pub(crate) fn scan(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        cause: impl std::fmt::Display,
    ) -> Self {
        Error::Scan {
            path: path.into(),
            message: message.into(),
            inner: Some(cause.to_string()),
        }
    }

    /// Reject blank input before doing any work.
    pub(crate) fn require_non_blank(value: &str, what: &'static str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(Error::Validation { what });
        }
        Ok(())
    }

    /// Whether this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// Whether this is a resolution error.
    pub fn is_resolution(&self) -> bool {
        matches!(self, Error::Resolution { .. })
    }

    /// Whether this is a scan error.
    pub fn is_scan(&self) -> bool {
        matches!(self, Error::Scan { .. })
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Error::Validation { what } => Diagnostic::error(format!("{} must not be empty", what)),

            Error::Resolution {
                message,
                details,
                source,
            } => {
                let mut diag = Diagnostic::error(message.clone());
                if let Some(source) = source {
                    diag = diag.with_context(format!("caused by: {}", source));
                }
                if let Some(details) = details {
                    for line in details.lines().filter(|l| !l.trim().is_empty()) {
                        diag = diag.with_context(line.trim_end());
                    }
                    diag = diag.with_suggestion(suggestions::BUILD_FAILED);
                }
                diag
            }

            Error::Staleness { path, source } => {
                Diagnostic::error(format!("failed to check staleness: {}", source))
                    .with_location(path)
            }

            Error::Scan {
                path,
                message,
                inner,
            } => {
                let mut diag = Diagnostic::error(message.clone()).with_location(path);
                if let Some(inner) = inner {
                    diag = diag.with_context(format!("dependency error: {}", inner));
                }
                diag.with_suggestion(suggestions::MISSING_DEPENDENCY)
            }
        }
    }
}
