//! jarflow CLI entry point
//!
//! Parses arguments, runs the subcommand and maps the result to an exit code:
//! 0 on success, 2 when a `detect --require` gate is closed, 1 on any error.

use anyhow::Result;
use clap::Parser;
use jarflow::cli::{self, CommandStatus};
use jarflow::core::error::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(CommandStatus::Success) => Ok(()),
        Ok(CommandStatus::GateClosed) => std::process::exit(2),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
