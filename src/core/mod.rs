//! Core data structures for typescan.
//!
//! - Project descriptors and the artifact path they imply
//! - Dependency manifests written next to build outputs
//! - The library error taxonomy

pub mod deps_manifest;
pub mod descriptor;
pub mod errors;

pub use deps_manifest::DependencyManifest;
pub use descriptor::{ArtifactLocation, ProjectDescriptor};
pub use errors::{Error, Result};
