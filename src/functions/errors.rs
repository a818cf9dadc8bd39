//! # Function Errors

use serde_json::{json, Value};
use thiserror::Error;

use super::handler::HandlerError;

/// Result type for function operations
pub type FunctionResult<T> = Result<T, FunctionError>;

/// Function errors
///
/// The first group is per-request and always contained in that request's
/// response. The second group only occurs while building the tables at
/// startup and is fatal.
#[derive(Debug, Error)]
pub enum FunctionError {
    #[error("Could not find function handler for {0}")]
    HandlerNotFound(String),

    #[error("Invalid body returned")]
    InvalidResult,

    #[error("Invalid status code returned: {0}")]
    InvalidStatusCode(String),

    #[error("Invalid header returned: {0}")]
    InvalidHeader(String),

    #[error("Invalid base64 body returned: {0}")]
    InvalidBase64(String),

    #[error("{0}")]
    HandlerThrew(HandlerError),

    #[error("No functions found in {0}")]
    StartupNoFunctions(String),

    #[error("Failed to read functions from {path}: {source}")]
    Discovery {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Route {method} {path} is registered more than once")]
    RouteConflict { method: String, path: String },

    #[error("Invalid route {path}: {reason}")]
    InvalidRoute { path: String, reason: String },
}

impl FunctionError {
    /// Wire `errorType` for this error
    pub fn error_type(&self) -> &str {
        match self {
            FunctionError::HandlerNotFound(_) => "HANDLER_NOT_FOUND",
            FunctionError::InvalidResult => "INVALID_BODY",
            FunctionError::InvalidStatusCode(_) => "INVALID_STATUS_CODE",
            FunctionError::InvalidHeader(_) => "INVALID_HEADER",
            FunctionError::InvalidBase64(_) => "INVALID_BASE64",
            FunctionError::HandlerThrew(error) => &error.kind,
            FunctionError::StartupNoFunctions(_) => "NO_FUNCTIONS",
            FunctionError::Discovery { .. } => "DISCOVERY_FAILED",
            FunctionError::RouteConflict { .. } => "ROUTE_CONFLICT",
            FunctionError::InvalidRoute { .. } => "INVALID_ROUTE",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        if self.is_startup() {
            500
        } else {
            502
        }
    }

    /// Whether this error can only be raised while building the tables
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            FunctionError::StartupNoFunctions(_)
                | FunctionError::Discovery { .. }
                | FunctionError::RouteConflict { .. }
                | FunctionError::InvalidRoute { .. }
        )
    }

    /// Structured body returned to the caller
    pub fn to_json(&self) -> Value {
        match self {
            FunctionError::HandlerThrew(error) => json!({
                "errorMessage": error.message,
                "errorType": error.kind,
                "stackTrace": error.stack_trace(),
            }),
            other => json!({
                "errorMessage": other.to_string(),
                "errorType": other.error_type(),
            }),
        }
    }
}
