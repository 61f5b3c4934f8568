//! Clipview CLI - Command-line interface
//!
//! Runs the preview server and resolves files from the shell.

mod commands;

use std::path::PathBuf;

use clap::Parser;
use clipview_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "clipview")]
#[command(about = "Video preview server for cloud-storage file browsers")]
#[command(version)]
struct Cli {
    /// Console log level; the log file always records everything
    #[arg(long, value_enum, default_value = "info", global = true)]
    log_level: CliLogLevel,

    /// Directory for the run log
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())?;

    commands::handle_command(cli.command).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_log_level_after_subcommand() {
        let cli = Cli::parse_from(["clipview", "resolve", "/a.mp4", "--log-level", "debug"]);
        assert_eq!(cli.log_level, CliLogLevel::Debug);
    }
}
