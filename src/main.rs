mod agents;
mod cli;
mod config;
mod error;
mod forge;
mod ivy;
mod maven;
mod repository;
mod utils;
mod workflow;

use clap::Parser;
use cli::Cli;
use colored::Colorize;
use config::{Credentials, Settings};
use std::process;

fn initialize_logger(verbose: bool) -> Result<(), log::SetLoggerError> {
    let filter = if verbose {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };

    let config = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("fireant")
        .build();

    simplelog::TermLogger::init(
        filter,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )
}

fn run(cli: &Cli) -> error::Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    let credentials = Credentials::from_env()?;
    workflow::execute_run(&settings, credentials, cli.dry_run)
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = initialize_logger(cli.verbose) {
        eprintln!("{} {}", "Warning:".yellow().bold(), e);
    }

    if let Err(e) = run(&cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
