//! Shared utilities

pub mod config;
pub mod context;
pub mod diagnostic;
pub mod fs;
pub mod process;

pub use config::Config;
pub use context::{GlobalContext, HostRuntime};
pub use diagnostic::Diagnostic;
pub use process::CancellationToken;
