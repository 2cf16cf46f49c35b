//! Command line utilities.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
pub use clap::Parser;
use clap::{Args, Subcommand};
use tracing::{error, info};

use crate::{
    compile::slug,
    config::{Config, OutputFormat},
    provider::{ContentProvider, FsSource},
};

/// Command line usage description.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Subcommand.
    #[command(subcommand)]
    pub command: Command,

    /// Command line options.
    #[command(flatten)]
    pub opts: Opts,
}

/// List of commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile every content file
    Build,

    /// Compile every content file, then recompile files on change
    Watch,

    /// Serve compiled content as JSON
    Serve {
        /// Server port
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
}

/// Command line options.
#[derive(Debug, Args, Clone, Default)]
pub struct Opts {
    /// Configuration file [default: "quire.toml"]
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Content directory [default: "content"]
    #[arg(long, global = true)]
    pub content: Option<PathBuf>,

    /// Output directory [default: "dist"]
    #[arg(long, global = true)]
    pub output: Option<PathBuf>,

    /// Output format [default: "module"]
    #[arg(long, global = true, value_enum)]
    pub format: Option<OutputFormat>,
}

/// Run the `build` command.
pub fn build(opts: &Opts) -> Result<()> {
    let config = Config::from_opts(opts).context("loading configuration")?;

    info!("Building...");

    let report = crate::build::build(&config)?;

    info!(
        "Built {} file(s) in {} s",
        report.slugs.len(),
        report.duration.as_secs_f32()
    );

    Ok(())
}

/// Run the `watch` command.
pub fn watch(opts: &Opts) -> Result<()> {
    let config = Config::from_opts(opts).context("loading configuration")?;
    let compiler = config.compiler()?;

    info!("Building...");

    if let Err(error) = crate::build::build_with(&config, &compiler) {
        error!("{:#}", anyhow::Error::from(error));
    }

    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(crate::watch::watch(
        &[config.content_dir.clone()],
        &[config.output_dir.clone()],
        |paths| {
            for path in paths.iter().filter(|path| slug::is_markdown(path)) {
                let slug = slug::resolve(path, Some(config.content_dir.as_path()));

                let result = if path.exists() {
                    info!("Compiling `{}`", slug);
                    crate::build::compile_one(&config, &compiler, path).map(|_| ())
                } else {
                    info!("Removing `{}`", slug);
                    crate::build::remove_output(&config, &slug)
                };

                if let Err(error) = result {
                    error!("{:#}", anyhow::Error::from(error));
                }
            }

            let slugs = crate::build::slugs(&config);

            if let Err(error) = crate::build::write_manifest(&config, &slugs) {
                error!("{:#}", anyhow::Error::from(error));
            }
        },
    ))?;

    Ok(())
}

/// Run the `serve` command.
pub fn serve(opts: &Opts, port: u16) -> Result<()> {
    let config = Config::from_opts(opts).context("loading configuration")?;

    let source = FsSource::new(config.compiler()?, &config.content_dir);
    let provider = Arc::new(ContentProvider::new(source));

    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        // Watch errors are logged; the server keeps running without reloads
        let watcher = async {
            let result = crate::watch::watch(&[config.content_dir.clone()], &[], |paths| {
                let slugs: Option<Vec<String>> = paths
                    .iter()
                    .map(|path| provider.source().slug_of(path))
                    .collect();

                match slugs {
                    Some(slugs) => {
                        for slug in slugs {
                            info!("Invalidating `{}`", slug);
                            provider.invalidate_cache(Some(&slug));
                        }
                    },
                    None => {
                        info!("Invalidating all content");
                        provider.invalidate_cache(None);
                    },
                }
            })
            .await;

            if let Err(error) = result {
                error!("{:#}", anyhow::Error::from(error));
            }

            std::future::pending::<()>().await
        };

        tokio::select! {
            result = crate::serve::serve(provider.clone(), port) => result,
            _ = watcher => Ok(()),
        }
    })?;

    Ok(())
}
