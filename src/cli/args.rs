//! CLI argument definitions using clap
//!
//! Commands:
//! - lambda-offline serve [--port N] [--root DIR] [--config FILE]
//! - lambda-offline routes [--root DIR] [--config FILE] [--json]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use super::errors::CliResult;
use crate::http_server::EmulatorConfig;

/// lambda-offline - Run FaaS handlers locally behind an HTTP server
#[derive(Parser, Debug)]
#[command(name = "lambda-offline")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Discover functions and serve them until interrupted
    Serve {
        /// Port to listen on (default: 3003)
        #[arg(long)]
        port: Option<u16>,

        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Print the route table and exit
    Routes {
        #[command(flatten)]
        project: ProjectArgs,

        /// Print the routes as a JSON array
        #[arg(long)]
        json: bool,
    },
}

/// Where the project lives and how it is configured
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// Project root containing the functions and handlers directories
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Path to a JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl ProjectArgs {
    /// Defaults, overridden by the config file, overridden by flags
    pub fn load_config(&self) -> CliResult<EmulatorConfig> {
        let mut config = match &self.config {
            Some(path) => EmulatorConfig::load(path)?,
            None => EmulatorConfig::default(),
        };
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        Ok(config)
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["lambda-offline", "serve"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Text);
        match cli.command {
            Command::Serve { port, project } => {
                assert_eq!(port, None);
                assert_eq!(project.load_config().unwrap(), EmulatorConfig::default());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offline.json");
        std::fs::write(&path, r#"{"root": "/from/file", "port": 4000}"#).unwrap();

        let cli = Cli::try_parse_from([
            "lambda-offline",
            "routes",
            "--config",
            path.to_str().unwrap(),
            "--root",
            "/from/flag",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);

        match cli.command {
            Command::Routes { project, json } => {
                assert!(!json);
                let config = project.load_config().unwrap();
                assert_eq!(config.root, PathBuf::from("/from/flag"));
                assert_eq!(config.port, 4000);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(Cli::try_parse_from(["lambda-offline", "deploy"]).is_err());
    }
}
