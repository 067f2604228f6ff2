// ABOUTME: Entry point for the fledged-imagemanager CLI application.
// ABOUTME: Parses arguments, sets up logging, and dispatches to the command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use fledged_imagemanager::config::Config;
use fledged_imagemanager::error::{Error, Result};
use fledged_imagemanager::output::Output;
use fledged_imagemanager::types::ImageWorkRequest;
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = cli.output;
    let mut output = Output::new(mode);
    output.start_timer();

    if let Err(e) = run(cli, output).await {
        Output::new(mode).error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: Output) -> Result<()> {
    let config = load_config(&cli)?;
    let request = match cli.command {
        Commands::Pull(target) => {
            ImageWorkRequest::pull(target.cache.clone(), target.node_target())
        }
        Commands::Purge(target) => {
            ImageWorkRequest::purge(target.cache.clone(), target.node_target())
        }
    };
    request
        .validate()
        .map_err(|e| Error::WorkFailed(format!("invalid request: {e}")))?;

    commands::run_image_work(config, request, output).await
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load(path),
        None => Config::discover(&env::current_dir()?),
    }
}
