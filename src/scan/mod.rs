//! Metadata-only type scanning.
//!
//! Reads managed modules from disk with `dotscope`, resolves cross-assembly
//! references through the artifact's dependency closure, and answers
//! conformance queries without executing any loaded code.

pub mod closure;
pub mod index;
pub mod loader;
pub mod module;
pub mod query;

pub use closure::{ClosureSettings, SearchLocationSet};
pub use index::{ScanSettings, TypeDescriptor, TypeIndex, DEFAULT_CORE_LIBRARY};
pub use query::{generic_name, ScanOptions, TypeName};
