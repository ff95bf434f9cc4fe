//! CLI argument definitions using clap
//!
//! - sluice                     # Run every scenario
//! - sluice map|times|queue     # Run a single scenario
//! - sluice --config sluice.toml times

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "sluice.toml";

#[derive(Parser)]
#[command(name = "sluice")]
#[command(about = "Sluice - run the bounded-concurrency demonstration scenarios")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (defaults are used when it is missing)
    #[arg(long, env = "SLUICE_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Map strings to their lengths with a concurrency limit
    Map,
    /// Run an indexed batch where one index fails
    Times,
    /// Push jobs through a queue, one of which fails
    Queue,
    /// Run every scenario in order
    All,
}

impl Cli {
    /// The selected scenario, `All` when none was given
    pub fn command(&self) -> Commands {
        self.command.unwrap_or(Commands::All)
    }
}
