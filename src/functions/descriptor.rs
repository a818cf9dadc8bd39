//! # Function Descriptors
//!
//! Function names follow `{resourcePath}_{httpMethod}` for synchronous API
//! routes and `{resourcePath}` for asynchronous fire-and-forget endpoints.

use serde::Serialize;

/// Separator between the resource path and the method token
pub const NAME_DELIMITER: char = '_';

/// How a function is exposed over HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationMode {
    /// Response is the handler's result
    Sync,
    /// Response is an immediate 202, the handler runs afterwards
    Async,
}

/// A discovered function and the route it maps to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDescriptor {
    pub name: String,
    pub resource_path: String,
    /// Upper-cased method token; absent for async-only functions
    pub method: Option<String>,
}

impl FunctionDescriptor {
    /// Split a function name into resource path and method.
    ///
    /// Only the first two segments are considered. The method token is not
    /// checked against known HTTP verbs.
    pub fn parse(name: &str) -> Self {
        let mut segments = name.split(NAME_DELIMITER);
        let resource_path = segments.next().unwrap_or_default().to_string();
        let method = segments
            .next()
            .filter(|token| !token.is_empty())
            .map(|token| token.to_uppercase());

        Self {
            name: name.to_string(),
            resource_path,
            method,
        }
    }

    pub fn mode(&self) -> InvocationMode {
        match self.method {
            Some(_) => InvocationMode::Sync,
            None => InvocationMode::Async,
        }
    }

    pub fn is_async(&self) -> bool {
        self.mode() == InvocationMode::Async
    }

    /// Method the route is registered under. Async endpoints accept POST.
    pub fn route_method(&self) -> &str {
        self.method.as_deref().unwrap_or("POST")
    }

    /// Route path under the given stage, e.g. `/dev/users`
    pub fn route_path(&self, stage: &str) -> String {
        format!("/{}/{}", stage, self.resource_path)
    }
}
