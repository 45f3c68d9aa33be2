//! regmonitor CLI — regulatory update monitoring pipeline.
//!
//! Crawls a registry of regulatory sources on a schedule, extracts and
//! classifies update announcements, and feeds new updates to the
//! downstream impact-assessment service.

mod commands;

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
