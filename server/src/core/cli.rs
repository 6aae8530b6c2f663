use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{
    ENV_CONFIG, ENV_DEBUG, ENV_ERROR_RECORD, ENV_EXCLUDE, ENV_HOST, ENV_ONLY_ROUTE, ENV_PORT,
};

#[derive(Parser)]
#[command(name = "periscope")]
#[command(version, about = "Request telemetry capture and inspection", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Enable debug mode (capture every event)
    #[arg(long, global = true, env = ENV_DEBUG)]
    pub debug: bool,

    /// Capture error events even when debug mode is off
    #[arg(long, global = true, env = ENV_ERROR_RECORD)]
    pub error_record: Option<bool>,

    /// Only capture requests that matched a route
    #[arg(long, global = true, env = ENV_ONLY_ROUTE)]
    pub only_route: Option<bool>,

    /// Request paths excluded from capture (comma separated, `*` suffix for prefixes)
    #[arg(long, global = true, env = ENV_EXCLUDE, value_delimiter = ',')]
    pub exclude: Option<Vec<String>>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the server (default command)
    Start,
    /// System maintenance commands
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum SystemCommands {
    /// Delete local data directory (captured entries). Requires confirmation.
    Prune {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub debug: bool,
    pub error_record: Option<bool>,
    pub only_route: Option<bool>,
    pub exclude: Option<Vec<String>>,
    pub config: Option<PathBuf>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();
    let config = CliConfig {
        host: cli.host,
        port: cli.port,
        debug: cli.debug,
        error_record: cli.error_record,
        only_route: cli.only_route,
        exclude: cli.exclude,
        config: cli.config,
    };
    (config, cli.command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_capture_flags() {
        let cli = Cli::try_parse_from([
            "periscope",
            "--debug",
            "--only-route",
            "true",
            "--exclude",
            "/health,/static*",
        ])
        .unwrap();
        assert!(cli.debug);
        assert_eq!(cli.only_route, Some(true));
        assert_eq!(
            cli.exclude,
            Some(vec!["/health".to_string(), "/static*".to_string()])
        );
    }

    #[test]
    fn test_parse_prune_command() {
        let cli = Cli::try_parse_from(["periscope", "system", "prune", "-y"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::System {
                command: SystemCommands::Prune { yes: true }
            })
        ));
    }
}
