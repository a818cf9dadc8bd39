//! CLI command implementations
//!
//! Both commands discover functions the same way; `serve` then runs the
//! HTTP server until Ctrl-C while `routes` only prints the table.

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::args::{Cli, Command, LogFormat, ProjectArgs};
use super::errors::{CliError, CliResult};
use super::io::{write_json, write_lines};
use crate::http_server::HttpServer;

/// Parse arguments, initialise logging and run the selected command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    init_logging(cli.log_format);
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve { port, project } => serve(&project, port),
        Command::Routes { project, json } => routes(&project, json),
    }
}

/// `RUST_LOG` controls the filter, defaulting to `info`
pub fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

/// Discover functions and serve them until Ctrl-C
pub fn serve(project: &ProjectArgs, port: Option<u16>) -> CliResult<()> {
    let mut config = project.load_config()?;
    if let Some(port) = port {
        config.port = port;
    }

    let server = HttpServer::from_directory(config)?;

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        server
            .serve_until(shutdown_signal())
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })
}

/// Discover functions and print the route table
pub fn routes(project: &ProjectArgs, json: bool) -> CliResult<()> {
    let config = project.load_config()?;
    let server = HttpServer::from_directory(config)?;
    let listing = server.routes().listing();

    if json {
        write_json(&listing)
    } else {
        write_lines(&listing)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(event = "signal_failed", error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!(event = "shutdown_requested", "Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::errors::CliErrorCode;
    use std::fs;

    #[test]
    fn test_routes_without_functions_fails() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("lambdas")).unwrap();

        let project = ProjectArgs {
            root: Some(dir.path().to_path_buf()),
            config: None,
        };
        let error = routes(&project, false).unwrap_err();
        assert_eq!(error.code(), &CliErrorCode::NoFunctions);
    }

    #[test]
    fn test_routes_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let project = ProjectArgs {
            root: Some(dir.path().to_path_buf()),
            config: None,
        };
        let error = routes(&project, false).unwrap_err();
        assert_eq!(error.code(), &CliErrorCode::BootFailed);
    }

    #[test]
    fn test_routes_with_functions() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("lambdas")).unwrap();
        fs::write(dir.path().join("lambdas").join("users_get.js"), "").unwrap();

        let project = ProjectArgs {
            root: Some(dir.path().to_path_buf()),
            config: None,
        };
        assert!(routes(&project, true).is_ok());
    }

    #[test]
    fn test_bad_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let project = ProjectArgs {
            root: None,
            config: Some(dir.path().join("missing.json")),
        };
        let error = serve(&project, None).unwrap_err();
        assert_eq!(error.code(), &CliErrorCode::ConfigError);
    }
}
