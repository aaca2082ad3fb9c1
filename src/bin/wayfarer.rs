// src/bin/wayfarer.rs

use clap::Parser;
use colored::*;
use wayfarer::cli::{Cli, dispatcher};

/// Sets up logging, parses arguments, dispatches to the handler and reports
/// any error in one place.
fn main() {
    env_logger::init();

    let cli = Cli::parse();
    log::debug!("CLI args parsed: {:?}", cli);

    if let Err(e) = dispatcher::dispatch(cli.args) {
        eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}
