//! typescan - resolve .NET build artifacts and scan their types
//!
//! This crate locates the compiled artifact of a project file, rebuilding
//! it when sources are newer, and indexes the artifact's types from
//! metadata alone for interface and base-type queries.

pub mod builder;
pub mod core;
pub mod ops;
pub mod scan;
pub mod util;

/// Test utilities and mocks for typescan unit tests.
///
/// This module is only available when compiling with `--cfg test`. It
/// provides a synthetic module writer, project fixtures, and a fake
/// build tool.
#[cfg(test)]
pub mod test_support;

pub use builder::{BuildInvoker, DotnetCli};
pub use core::{Error, Result};
pub use ops::{ArtifactResolver, BuildStrategy, ResolutionResult, ResolveOutcome};
pub use scan::{ScanOptions, ScanSettings, TypeDescriptor, TypeIndex};
pub use util::context::{GlobalContext, HostRuntime};
pub use util::process::CancellationToken;
