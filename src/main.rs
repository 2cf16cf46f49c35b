//! Compile markdown content into cacheable records.

use anyhow::Result;
use quire::cli::{Cli, Command, Parser};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .without_time()
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Build => quire::cli::build(&cli.opts)?,
        Command::Watch => quire::cli::watch(&cli.opts)?,
        Command::Serve { port } => quire::cli::serve(&cli.opts, port)?,
    }

    Ok(())
}
