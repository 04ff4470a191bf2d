//! mdsandbox CLI entry point.
//!
//! Parses arguments, runs the document pipeline, and renders any failure
//! through the user-friendly error formatter before exiting non-zero.

use anyhow::Result;
use clap::Parser;
use mdsandbox::cli::Cli;
use mdsandbox::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
