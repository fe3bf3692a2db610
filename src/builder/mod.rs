//! Build orchestration: freshness checks and the external build tool.

pub mod invoker;
pub mod staleness;

pub use invoker::{BuildInvoker, BuildOutput, BuildStatus, DotnetCli};
pub use staleness::StalenessCheck;
