//! notionbackup CLI Binary
//!
//! Command-line interface for backing up and restoring Notion workspaces.

use anyhow::Context;
use clap::Parser;
use notionbackup::logging::init_logging;
use notionbackup::tooling::cli::{Cli, CliContext};
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<String> {
    let context = CliContext::new(cli).context("Failed to load configuration")?;
    init_logging(Some(&context.config().logging)).context("Failed to initialize logging")?;
    let output = context.execute(&cli.command).await?;
    Ok(output)
}
