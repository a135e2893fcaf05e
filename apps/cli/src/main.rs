//! Leadsense CLI — B2B lead discovery from the terminal.
//!
//! Finds target sectors for a company profile, searches the web for
//! businesses in them, scrapes company details, and tracks saved leads.

mod commands;
mod progress;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
