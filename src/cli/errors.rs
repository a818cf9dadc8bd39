//! CLI-specific error types
//!
//! All CLI errors are fatal and exit with status 1.

use std::fmt;
use std::io;

use crate::functions::FunctionError;
use crate::http_server::ConfigError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdout)
    IoError,
    /// Discovery found nothing to serve
    NoFunctions,
    /// Boot failed
    BootFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "LAMBDA_OFFLINE_CONFIG_ERROR",
            Self::IoError => "LAMBDA_OFFLINE_IO_ERROR",
            Self::NoFunctions => "LAMBDA_OFFLINE_NO_FUNCTIONS",
            Self::BootFailed => "LAMBDA_OFFLINE_BOOT_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Nothing discovered
    pub fn no_functions(dir: impl fmt::Display) -> Self {
        Self::new(
            CliErrorCode::NoFunctions,
            format!("No functions found in {}", dir),
        )
    }

    /// Boot failed
    pub fn boot_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::BootFailed, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<FunctionError> for CliError {
    fn from(e: FunctionError) -> Self {
        match e {
            FunctionError::StartupNoFunctions(dir) => Self::no_functions(dir),
            other => Self::boot_failed(other.to_string()),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_functions_message() {
        let error = CliError::from(FunctionError::StartupNoFunctions("./lambdas".to_string()));
        assert_eq!(error.code(), &CliErrorCode::NoFunctions);
        assert_eq!(
            error.to_string(),
            "LAMBDA_OFFLINE_NO_FUNCTIONS: No functions found in ./lambdas"
        );
    }

    #[test]
    fn test_route_conflict_is_boot_failure() {
        let error = CliError::from(FunctionError::RouteConflict {
            method: "GET".to_string(),
            path: "/dev/users".to_string(),
        });
        assert_eq!(error.code_str(), "LAMBDA_OFFLINE_BOOT_FAILED");
    }
}
