//! Main entry point for zfstools CLI

use clap::Parser;
use zfstools::cli::Cli;
use zfstools::commands::{execute_command, RunOptions};

fn main() {
    // Parse command line arguments
    let cli = Cli::parse();
    let options = RunOptions::from_cli(&cli);

    // Initialize logging; RUST_LOG applies unless --debug is given
    let mut logger = env_logger::Builder::from_default_env();
    if options.debug || std::env::var_os("RUST_LOG").is_none() {
        logger.filter_level(options.log_level());
    }
    logger.init();

    if let Err(e) = execute_command(cli.command, &options) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
