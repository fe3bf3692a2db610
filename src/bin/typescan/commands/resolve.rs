//! `typescan resolve` command

use anyhow::Result;

use crate::cli::ResolveArgs;
use typescan::util::GlobalContext;

pub fn execute(args: ResolveArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let config = super::config(&ctx);
    let dotnet = super::dotnet();

    let result = super::resolve_project(&dotnet, &config, &args.build, &args.project)?;

    if let Some(ref output) = result.build_output {
        tracing::debug!("build output:\n{}", output);
        eprintln!("       Built {}", result.artifact_path.display());
    } else {
        eprintln!("  Up to date {}", result.artifact_path.display());
    }
    println!("{}", result.artifact_path.display());

    Ok(())
}
