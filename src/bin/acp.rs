//! ACP CLI Binary
//!
//! Command-line interface for the ACP coordinator.

use acp_ledger::logging::init_logging;
use acp_ledger::tooling::cli::{load_config, Cli, CliContext};
use clap::Parser;
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            process::exit(1);
        }
    };

    let logging = cli.logging_config(&config.logging);
    if let Err(e) = init_logging(Some(&logging)) {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }

    let context = match CliContext::new(config, cli.format, cli.simulate) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error opening ledger: {}", e);
            process::exit(1);
        }
    };

    let result = context.execute(&cli.command).await;
    if let Err(e) = context.shutdown().await {
        eprintln!("Warning: ledger flush failed: {}", e);
    }

    match result {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
