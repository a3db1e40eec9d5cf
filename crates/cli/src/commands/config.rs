//! Inspect and create the configuration file

use std::path::Path;

use anyhow::{bail, Result};
use authprobe_e2e::ProbeConfig;
use clap::Subcommand;
use colored::Colorize;

use crate::output::{self, OutputFormat};

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write the default configuration to the config path
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate the configuration without launching a browser
    Check,
}

pub fn execute(cmd: ConfigCommands, path: &Path, config: ProbeConfig, format: OutputFormat) -> Result<bool> {
    match cmd {
        ConfigCommands::Show => {
            output::print_value(&config, format);
            Ok(true)
        }
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            ProbeConfig::default().save(path)?;
            output::print_success(&format!("Wrote default configuration to {}", path.display()));
            Ok(true)
        }
        ConfigCommands::Check => match config.validate() {
            Ok(()) => {
                let registry = config.registry()?;
                for role in registry.roles() {
                    let chosen = registry.resolve(role)?;
                    let marker = if chosen.is_semantic() { "semantic".green() } else { "structural".yellow() };
                    println!("  {:<16} {} [{}]", role.bold(), chosen, marker);
                }
                output::print_success("Configuration is valid");
                Ok(true)
            }
            Err(e) => {
                output::print_error(&format!("Invalid configuration: {}", e));
                Ok(false)
            }
        },
    }
}
