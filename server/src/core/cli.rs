use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::constants::{ENV_DB_PATH, ENV_HOST, ENV_PORT, ENV_UPLOADS_DIR};

#[derive(Parser)]
#[command(name = "chatrelay")]
#[command(version, about = "Local-first OpenRouter gateway", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Database file path
    #[arg(long, global = true, env = ENV_DB_PATH)]
    pub db_path: Option<PathBuf>,

    /// Uploads root directory
    #[arg(long, global = true, env = ENV_UPLOADS_DIR)]
    pub uploads_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway (default)
    Start,
}

/// Resolved CLI overrides, separated from the clap surface so config loading
/// does not depend on clap types
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db_path: Option<PathBuf>,
    pub uploads_dir: Option<PathBuf>,
}

pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();
    (
        CliConfig {
            host: cli.host,
            port: cli.port,
            db_path: cli.db_path,
            uploads_dir: cli.uploads_dir,
        },
        cli.command,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_overrides() {
        let cli = Cli::parse_from(["chatrelay", "--host", "0.0.0.0", "--port", "9000"]);
        assert_eq!(cli.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(cli.port, Some(9000));
    }

    #[test]
    fn test_cli_start_subcommand() {
        let cli = Cli::parse_from(["chatrelay", "start"]);
        assert!(matches!(cli.command, Some(Commands::Start)));
    }
}
