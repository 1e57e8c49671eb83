//! gamma-events CLI, a terminal renderer for the community events listing.
//!
//! Fetches the year-indexed events manifest, attaches each event's write-up,
//! and prints the result.

mod commands;
mod render;

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
