//! AuthProbe CLI - Main Entry Point
//!
//! Runs authentication-flow scenarios against a web application and reports
//! which checks held. Exit status: 0 when every scenario passed, 1 when any
//! failed, 2 when the run itself could not be carried out.

use std::path::PathBuf;

use anyhow::Result;
use authprobe_e2e::ProbeConfig;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{config, preflight, run, scenarios};

/// AuthProbe - browser-driven login/logout verification
#[derive(Parser)]
#[command(name = "authprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (defaults are used when it does not exist)
    #[arg(short, long, default_value = "authprobe.toml", env = "AUTHPROBE_CONFIG", global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios through a real browser
    Run(run::RunArgs),

    /// List scenarios and their expected end state
    List(scenarios::ListArgs),

    /// Manage the configuration file
    #[command(subcommand)]
    Config(config::ConfigCommands),

    /// Check configuration, Playwright and target reachability
    Preflight(preflight::PreflightArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let code = match dispatch(cli).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            2
        }
    };
    std::process::exit(code);
}

async fn dispatch(cli: Cli) -> Result<bool> {
    let loaded = ProbeConfig::load(&cli.config);

    match cli.command {
        Commands::Run(args) => run::execute(args, loaded?, cli.format).await,
        Commands::List(args) => {
            scenarios::execute(args, cli.format)?;
            Ok(true)
        }
        Commands::Config(cmd) => {
            let config = match &cmd {
                // A broken file must not prevent writing a fresh one
                config::ConfigCommands::Init { .. } => loaded.unwrap_or_default(),
                _ => loaded?,
            };
            config::execute(cmd, &cli.config, config, cli.format)
        }
        Commands::Preflight(args) => preflight::execute(args, &loaded?).await,
        Commands::Version => {
            println!("AuthProbe CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Authentication-flow verification through Playwright");
            Ok(true)
        }
    }
}
