//! Command implementations

pub mod find;
pub mod resolve;

use anyhow::Result;

use crate::cli::BuildOpts;
use typescan::util::config::{load_config, Config};
use typescan::util::GlobalContext;
use typescan::{ArtifactResolver, BuildInvoker, DotnetCli, ResolutionResult};

/// The `dotnet` on `PATH`. A missing SDK only matters once a build runs.
pub fn dotnet() -> DotnetCli {
    DotnetCli::from_path().unwrap_or_else(|e| {
        tracing::debug!("{:#}", e);
        DotnetCli::with_program("dotnet")
    })
}

/// Load configuration for the current directory.
pub fn config(ctx: &GlobalContext) -> Config {
    load_config(&ctx.config_path(), &ctx.project_config_path())
}

/// Resolve `project`, with flags taking precedence over configuration.
pub fn resolve_project(
    invoker: &dyn BuildInvoker,
    config: &Config,
    opts: &BuildOpts,
    project: &str,
) -> Result<ResolutionResult> {
    let settings = &config.resolve;

    let check_paths = if opts.check_paths.is_empty() {
        settings.check_paths.clone()
    } else {
        Some(opts.check_paths.clone())
    };
    let configuration = opts
        .configuration
        .clone()
        .or_else(|| settings.configuration.clone())
        .unwrap_or_else(|| "Debug".to_string());

    let resolver = ArtifactResolver::new(invoker)
        .strategy(opts.strategy.or(settings.strategy).unwrap_or_default())
        .configuration(configuration)
        .check_paths(check_paths)
        .check_for_edit(opts.check_for_edit || settings.check_for_edit.unwrap_or(false))
        .on_build_start({
            let project = project.trim().to_string();
            move || eprintln!("    Building {}", project)
        });

    Ok(resolver.resolve(project)?)
}
