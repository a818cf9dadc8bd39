//! CLI module for lambda-offline
//!
//! Provides command-line interface for:
//! - serve: Discover functions and serve them over HTTP
//! - routes: Print the route table and exit

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, LogFormat, ProjectArgs};
pub use commands::{init_logging, routes, run, run_command, serve};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_json, write_lines};
