//! High-level operations.

pub mod resolve_artifact;

pub use resolve_artifact::{ArtifactResolver, BuildStrategy, ResolutionResult, ResolveOutcome};
