//! # HTTP Server Module
//!
//! Exposes discovered functions over HTTP under `/{stage}/{resourcePath}`.
//!
//! # Endpoints
//!
//! - `{METHOD} /{stage}/{path}` - synchronous function, responds with its result
//! - `POST /{stage}/{path}` - asynchronous function, responds 202 immediately
//! - `OPTIONS /{stage}/{path}` - CORS preflight for paths with synchronous routes
//! - anything else - 404 listing the registered routes

pub mod config;
pub mod response;
pub mod routes;
pub mod server;

pub use config::{ConfigError, EmulatorConfig};
pub use routes::{RouteEntry, RouteMatch, RouteTable, RouteTarget};
pub use server::{HttpServer, ServerHandle};
