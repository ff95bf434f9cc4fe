//! Sluice console harness
//!
//! Runs the demonstration scenarios against the core primitives and prints how
//! long each one took.
//!
//! ```bash
//! sluice                 # every scenario
//! sluice times           # one scenario
//! RUST_LOG=sluice_core=debug sluice queue
//! ```

mod args;
mod console;
mod scenarios;

use clap::Parser;

use args::Cli;
use console::CLIConsole;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set RUST_LOG=debug for verbose logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let console = CLIConsole::new(cli.verbose);

    let config = sluice_core::load_from_file(&cli.config)?;
    console.info(&format!("configuration: {config:?}"));

    if let Err(error) = scenarios::run(cli.command(), &config, &console).await {
        console.error(&format!("{error:#}"));
        return Err(error);
    }
    Ok(())
}
