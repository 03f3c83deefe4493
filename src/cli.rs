use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "fireant",
    about = "Fireant - opens pull requests that upgrade stale Ivy dependencies",
    version,
    author
)]
pub struct Cli {
    /// Settings file (defaults to ./fireant.toml when present)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable verbose output for debugging
    #[arg(short, long)]
    pub verbose: bool,

    /// Scan and plan only; never edit manifests or contact the forge
    #[arg(long)]
    pub dry_run: bool,
}
