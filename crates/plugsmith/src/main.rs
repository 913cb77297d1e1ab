//! plugsmith CLI - release engineering for remote code-generation plugins
//!
//! This is the main entry point for the plugsmith command-line interface.

mod cli;
mod commands;
mod context;
mod output;

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};
use context::Context;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize rustls crypto provider (required for rustls 0.23+)
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::error(&format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = Context::load(cli.config.as_deref())?;
    plugsmith_core::cancel::cancel_on_ctrl_c(ctx.cancel.clone());

    match cli.command {
        Commands::Discover(args) => commands::discover::run(args),
        Commands::Fetch(args) => commands::fetch::run(args, &ctx).await,
        Commands::Build(args) => commands::image::build(args, &ctx).await,
        Commands::Push(args) => commands::image::push(args, &ctx).await,
        Commands::Package(args) => commands::package::run(args, &ctx).await,
        Commands::Release(args) => commands::release::run(args, &ctx).await,
        Commands::Latest(args) => commands::latest::run(args, &ctx).await,
        Commands::Download(args) => commands::download::run(args, &ctx).await,
        Commands::Restore(args) => commands::restore::run(args, &ctx).await,
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
