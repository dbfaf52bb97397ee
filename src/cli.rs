//! Command-line interface parsing for launchtrack
//!
//! This module handles parsing of CLI arguments using clap: the config file
//! location, a listen address override and the command to run.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::config::{Config, ConfigError};

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// The --bind value is not a socket address
    #[error("Invalid bind address: '{0}'. Expected HOST:PORT, e.g. 127.0.0.1:8000")]
    InvalidBind(String),

    /// The config file could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// launchtrack - Launch telemetry service
#[derive(Parser, Debug)]
#[command(name = "launchtrack")]
#[command(about = "Launch telemetry API with cached statistics and scheduled refresh")]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(long, short, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Address to listen on, overriding the config file
    ///
    /// Examples:
    ///   launchtrack --bind 0.0.0.0:8000
    ///   launchtrack serve --bind 127.0.0.1:9000
    #[arg(long, value_name = "ADDR", global = true)]
    pub bind: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// What to run
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Run one forced backfill from upstream and exit
    Refresh,
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone)]
pub struct StartupConfig {
    /// Command to run
    pub command: Command,
    /// Effective configuration with CLI overrides applied
    pub config: Config,
}

/// Parses a --bind argument into a socket address.
///
/// # Arguments
/// * `s` - The address string from CLI
///
/// # Returns
/// * `Ok(SocketAddr)` if the string is a valid `HOST:PORT`
/// * `Err(CliError::InvalidBind)` otherwise
pub fn parse_bind_arg(s: &str) -> Result<SocketAddr, CliError> {
    s.parse().map_err(|_| CliError::InvalidBind(s.to_string()))
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// Loads the config file when one is given, otherwise starts from the
    /// defaults, then applies the --bind override.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with the effective settings
    /// * `Err(CliError)` if the config file or the bind address is invalid
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let mut config = match &cli.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(bind) = &cli.bind {
            config.server.bind = parse_bind_arg(bind)?.to_string();
        }

        Ok(StartupConfig {
            command: cli.command.unwrap_or(Command::Serve),
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_bind_arg_valid() {
        let addr = parse_bind_arg("127.0.0.1:8000").unwrap();
        assert_eq!(addr.port(), 8000);
        assert!(parse_bind_arg("[::1]:9000").is_ok());
    }

    #[test]
    fn test_parse_bind_arg_invalid() {
        let result = parse_bind_arg("localhost");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Invalid bind address"));
        assert!(err.to_string().contains("localhost"));
    }

    #[test]
    fn test_cli_parse_no_args() {
        let cli = Cli::parse_from(["launchtrack"]);
        assert!(cli.config.is_none());
        assert!(cli.bind.is_none());
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_refresh_command() {
        let cli = Cli::parse_from(["launchtrack", "refresh"]);
        assert_eq!(cli.command, Some(Command::Refresh));
    }

    #[test]
    fn test_cli_parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["launchtrack", "serve", "--bind", "0.0.0.0:9000"]);
        assert_eq!(cli.command, Some(Command::Serve));
        assert_eq!(cli.bind.as_deref(), Some("0.0.0.0:9000"));
    }

    #[test]
    fn test_startup_config_defaults_to_serve() {
        let cli = Cli::parse_from(["launchtrack"]);
        let startup = StartupConfig::from_cli(&cli).unwrap();
        assert_eq!(startup.command, Command::Serve);
        assert_eq!(startup.config, Config::default());
    }

    #[test]
    fn test_startup_config_applies_bind_override() {
        let cli = Cli::parse_from(["launchtrack", "--bind", "0.0.0.0:9000"]);
        let startup = StartupConfig::from_cli(&cli).unwrap();
        assert_eq!(startup.config.server.bind, "0.0.0.0:9000");
    }

    #[test]
    fn test_startup_config_rejects_invalid_bind() {
        let cli = Cli::parse_from(["launchtrack", "--bind", "nowhere"]);
        assert!(matches!(
            StartupConfig::from_cli(&cli),
            Err(CliError::InvalidBind(_))
        ));
    }

    #[test]
    fn test_startup_config_loads_file_then_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("launchtrack.toml");
        std::fs::write(&path, "[server]\nbind = \"127.0.0.1:7000\"\n[cache]\nttl_secs = 5\n").unwrap();
        let path_arg = path.to_string_lossy().to_string();

        let cli = Cli::parse_from(["launchtrack", "--config", path_arg.as_str()]);
        let startup = StartupConfig::from_cli(&cli).unwrap();
        assert_eq!(startup.config.server.bind, "127.0.0.1:7000");
        assert_eq!(startup.config.cache.ttl_secs, 5);

        let cli = Cli::parse_from([
            "launchtrack",
            "--config",
            path_arg.as_str(),
            "--bind",
            "127.0.0.1:7001",
        ]);
        let startup = StartupConfig::from_cli(&cli).unwrap();
        assert_eq!(startup.config.server.bind, "127.0.0.1:7001");
    }

    #[test]
    fn test_startup_config_missing_file_fails() {
        let cli = Cli::parse_from(["launchtrack", "--config", "/nonexistent/launchtrack.toml"]);
        assert!(matches!(
            StartupConfig::from_cli(&cli),
            Err(CliError::Config(ConfigError::ReadFile(_)))
        ));
    }
}
