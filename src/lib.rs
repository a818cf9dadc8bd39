//! lambda-offline - Serve FaaS-style handler functions over local HTTP
//!
//! Function names in a directory become routes: `{resourcePath}_{method}`
//! is served synchronously at `/{stage}/{resourcePath}`, a bare
//! `{resourcePath}` becomes an asynchronous `POST` endpoint. Each request is
//! translated into an API-gateway style event plus an invocation context,
//! and the handler's result is translated back into the HTTP response.

pub mod cli;
pub mod functions;
pub mod http_server;
