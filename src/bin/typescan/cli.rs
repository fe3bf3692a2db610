//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

use typescan::BuildStrategy;

/// typescan - resolve .NET build artifacts and query their types
#[derive(Parser)]
#[command(name = "typescan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Locate a project's artifact, building it when out of date
    Resolve(ResolveArgs),

    /// Find types in an artifact by interface or base type
    Find(FindArgs),
}

/// Options shared by every command that resolves a project.
#[derive(Args, Clone, Default)]
pub struct BuildOpts {
    /// When to build: never, auto or always
    #[arg(long, env = "TYPESCAN_STRATEGY", value_name = "STRATEGY")]
    pub strategy: Option<BuildStrategy>,

    /// Build configuration
    #[arg(short, long, value_name = "NAME")]
    pub configuration: Option<String>,

    /// Limit the staleness check to this path (relative to the project)
    #[arg(long = "check-path", value_name = "PATH")]
    pub check_paths: Vec<PathBuf>,

    /// Compare file timestamps as well as directory timestamps
    #[arg(long)]
    pub check_for_edit: bool,
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Path to the project file
    pub project: String,

    #[command(flatten)]
    pub build: BuildOpts,
}

#[derive(Args)]
#[command(group(ArgGroup::new("conformance").required(true).args(["implements", "derives"])))]
pub struct FindArgs {
    /// Artifact to scan, or a project file to resolve first
    pub path: String,

    /// Match types implementing this interface (repeatable)
    #[arg(long, value_name = "NAME")]
    pub implements: Vec<String>,

    /// Match types deriving from this class (repeatable)
    #[arg(long, value_name = "NAME")]
    pub derives: Vec<String>,

    /// Return only the first type with this name
    #[arg(long, value_name = "TYPE")]
    pub name: Option<String>,

    /// Compare --name against full names
    #[arg(long, requires = "name")]
    pub target_full_name: bool,

    /// Compare interface and base names by full name
    #[arg(long)]
    pub full_name: bool,

    /// Include abstract classes
    #[arg(long)]
    pub include_abstract: bool,

    /// Include non-public types
    #[arg(long)]
    pub include_non_public: bool,

    /// Include value types
    #[arg(long)]
    pub include_structs: bool,

    /// Include nested types
    #[arg(long)]
    pub include_nested: bool,

    /// Print matching types as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub build: BuildOpts,
}
