use std::{path::PathBuf, time::Duration};

use clap::Parser;

use crate::{cli::styles, config::duration, orchestration::LaunchMode};

//-------------------------------------------------------------------------------------------------
// Types
//-------------------------------------------------------------------------------------------------

/// `envcore` starts, monitors and stops bundles of applications and websites
#[derive(Debug, Parser)]
#[command(name = "envcore", author, about, version, styles=styles::styles())]
pub struct EnvcoreArgs {
    /// The subcommand to run
    #[command(subcommand)]
    pub subcommand: Option<EnvcoreSubcommand>,

    /// Path to the configuration file. Defaults to `~/.envcore/envcore.yaml`
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available subcommands
#[derive(Debug, Parser)]
pub enum EnvcoreSubcommand {
    /// Start one or more environments and keep them running until interrupted
    #[command(name = "up")]
    Up {
        /// Names of the environments to start
        #[arg(required = true)]
        environments: Vec<String>,

        /// How the environments are launched. Defaults to the configured mode
        #[arg(short, long, value_enum)]
        mode: Option<LaunchMode>,

        /// Switch to the last environment once it started
        #[arg(short, long)]
        switch: bool,

        /// Print the system status at this interval, e.g. `5s`
        #[arg(short, long, value_parser = parse_duration)]
        watch: Option<Duration>,
    },

    /// List the environments defined in the configuration
    #[command(name = "list")]
    List {
        /// Print the environments as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check the configuration file for errors
    #[command(name = "validate")]
    Validate,
}

//-------------------------------------------------------------------------------------------------
// Functions: Helpers
//-------------------------------------------------------------------------------------------------

fn parse_duration(value: &str) -> Result<Duration, String> {
    duration::parse(value).map_err(|e| e.to_string())
}

//-------------------------------------------------------------------------------------------------
// Tests
//-------------------------------------------------------------------------------------------------
