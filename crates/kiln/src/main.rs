//! Kiln CLI - static site build orchestrator.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use kiln_static::BuildMode;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Build static sites and preview them with live reload")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to kiln.toml config file
    #[arg(short, long, global = true, default_value = "kiln.toml")]
    config: PathBuf,

    /// Minify output and leave out the live-reload client
    #[arg(long, global = true)]
    production: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold a new site in the config file's directory
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },

    /// Build the site once
    Build,

    /// Build, serve and rebuild on change
    #[command(alias = "watch")]
    Dev {
        /// Port to listen on (defaults to config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    fmt().with_env_filter(filter).with_target(false).init();

    let mode = if cli.production {
        BuildMode::Production
    } else {
        BuildMode::Development
    };

    match cli.command {
        Commands::Init { yes } => {
            commands::init::run(&cli.config, yes)?;
        }
        Commands::Build => {
            let config = config::load(&cli.config, mode)?;
            commands::build::run(config).await?;
        }
        Commands::Dev { port, no_open } => {
            let config = config::load(&cli.config, mode)?;
            commands::dev::run(config, port, !no_open).await?;
        }
    }

    Ok(())
}
