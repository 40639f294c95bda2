//! pdftk - Merge, split, rotate, encrypt, stamp and inspect PDF documents.
//!
//! Command-line front end for the `pdftk` library.

mod cli;

use clap::Parser;
use std::process;

use crate::cli::Cli;
use pdftk::config::GlobalConfig;
use pdftk::output::{OutputFormatter, display_error};
use pdftk::prompt::StdinPrompter;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    let log_level = if cli.is_verbose() { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let formatter = OutputFormatter::from_config(&GlobalConfig::prescan(&cli.args));
    let mut prompter = StdinPrompter::new();

    // Run the application and handle errors
    if let Err(err) = pdftk::ops::run(&cli.args, &mut prompter).await {
        display_error(&formatter, &err);
        process::exit(err.exit_code());
    }
}
