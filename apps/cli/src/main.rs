//! chargen CLI: character profile generation and repair.
//!
//! Generates, refines, and repairs character-profile JSON through an
//! OpenRouter model, and serves the same operations over HTTP.

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
