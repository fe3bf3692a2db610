//! `typescan find` command

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::cli::FindArgs;
use typescan::core::descriptor::ARTIFACT_EXTENSION;
use typescan::scan::ClosureSettings;
use typescan::util::config::Config;
use typescan::util::GlobalContext;
use typescan::{Error, ScanOptions, ScanSettings, TypeDescriptor, TypeIndex};

pub fn execute(args: FindArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let config = super::config(&ctx);

    let artifact = artifact_path(&args, &config)?;
    let index = TypeIndex::open(&artifact, &scan_settings(&config))?;

    let options = ScanOptions::new()
        .match_full_name(args.full_name)
        .include_abstract(args.include_abstract)
        .include_non_public(args.include_non_public)
        .include_structs(args.include_structs)
        .include_nested_types(args.include_nested);
    let implements = !args.implements.is_empty();
    let names = if implements {
        args.implements.clone()
    } else {
        args.derives.clone()
    };

    let found: Vec<&TypeDescriptor> = match args.name {
        Some(ref target) => {
            let first = if implements {
                index.find_one_implementing(target, names, options, args.target_full_name)?
            } else {
                index.find_one_deriving(target, names, options, args.target_full_name)?
            };
            match first {
                Some(ty) => vec![ty],
                None => bail!("no type named `{}` matches", target),
            }
        }
        None if implements => index.find_all_implementing(names, options)?,
        None => index.find_all_deriving(names, options)?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&found)?);
    } else {
        for ty in &found {
            println!("{}", ty.full_name);
        }
    }
    eprintln!(
        "       Found {} type{} in {}",
        found.len(),
        if found.len() == 1 { "" } else { "s" },
        artifact.display()
    );

    index.close();
    Ok(())
}

/// Use the path as an artifact, or resolve it first when it names a project.
fn artifact_path(args: &FindArgs, config: &Config) -> Result<PathBuf> {
    if args.path.trim().is_empty() {
        return Err(Error::Validation {
            what: "artifact path",
        }
        .into());
    }

    let path = Path::new(args.path.trim());
    let is_artifact = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ARTIFACT_EXTENSION));
    if is_artifact {
        return Ok(path.to_path_buf());
    }

    let dotnet = super::dotnet();
    let result = super::resolve_project(&dotnet, config, &args.build, &args.path)?;
    Ok(result.artifact_path)
}

fn scan_settings(config: &Config) -> ScanSettings {
    let mut closure = ClosureSettings::detect();
    if let Some(ref root) = config.scan.package_root {
        closure = closure.with_package_root(root.clone());
    }
    let mut settings = ScanSettings {
        closure,
        ..ScanSettings::default()
    };
    if let Some(ref name) = config.scan.core_library {
        settings = settings.with_core_library(name);
    }
    settings
}
