//! # HTTP Server
//!
//! A single fallback handler dispatches every request through the route
//! table, so routes for arbitrary method tokens never need to be known to
//! the axum router itself.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::ORIGIN;
use axum::http::request::Parts;
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::config::EmulatorConfig;
use super::response::{
    accepted_response, error_response, marshal_result, not_found_response,
    payload_too_large_response, preflight_response, unreadable_body_response,
};
use super::routes::{RouteMatch, RouteTable, RouteTarget};
use crate::functions::event::EMPTY_BODY;
use crate::functions::{
    discover_function_names, EventSource, ExecutableResolver, FunctionDescriptor, FunctionError,
    FunctionResult, HandlerError, HandlerTable, IdentityOverrides, InvocationEvent, Invoker,
};

/// Source address reported when the listener did not record one
const FALLBACK_SOURCE_IP: &str = "127.0.0.1";

#[derive(Clone)]
struct AppState {
    routes: Arc<RouteTable>,
    invoker: Invoker,
    stage: Arc<str>,
    max_body_bytes: usize,
}

/// HTTP server exposing discovered functions
pub struct HttpServer {
    config: EmulatorConfig,
    routes: Arc<RouteTable>,
    invoker: Invoker,
}

impl HttpServer {
    /// Create a server for an already built handler table
    pub fn new(config: EmulatorConfig, table: HandlerTable) -> FunctionResult<Self> {
        if table.is_empty() {
            return Err(FunctionError::StartupNoFunctions(
                config.functions_path().display().to_string(),
            ));
        }
        let routes = RouteTable::build(table.descriptors(), &config.stage)?;
        Ok(Self {
            config,
            routes: Arc::new(routes),
            invoker: Invoker::new(Arc::new(table)),
        })
    }

    /// Discover function names in the functions directory and load their
    /// executables from the handlers directory
    pub fn from_directory(config: EmulatorConfig) -> FunctionResult<Self> {
        let functions_path = config.functions_path();
        let names = discover_function_names(&functions_path)?;
        if names.is_empty() {
            return Err(FunctionError::StartupNoFunctions(
                functions_path.display().to_string(),
            ));
        }

        let resolver = ExecutableResolver::new(config.handlers_path());
        let table = HandlerTable::build(&names, &resolver);
        Self::new(config, table)
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(&self) -> Router {
        let state = AppState {
            routes: Arc::clone(&self.routes),
            invoker: self.invoker.clone(),
            stage: Arc::from(self.config.stage.as_str()),
            max_body_bytes: self.config.max_body_bytes,
        };

        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
    }

    /// Serve until `shutdown` resolves, then stop accepting connections
    pub async fn serve_until<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.socket_addr()).await?;
        self.serve_on(listener, shutdown).await
    }

    /// Bind and serve in the background. Port 0 picks a free port.
    pub async fn spawn(self) -> std::io::Result<ServerHandle> {
        let listener = TcpListener::bind(self.config.socket_addr()).await?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(self.serve_on(listener, async move {
            let _ = shutdown_rx.await;
        }));

        Ok(ServerHandle {
            local_addr,
            shutdown: Some(shutdown_tx),
            task,
        })
    }

    async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        for route in self.routes.listing() {
            info!(event = "route_registered", "{}", route);
        }
        info!(
            event = "server_started",
            addr = %local_addr,
            routes = self.routes.len(),
            "Offline listening on http://{}",
            local_addr
        );

        let app = self.router();
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        info!(event = "server_stopped", addr = %local_addr, "Server stopped");
        Ok(())
    }
}

/// Handle to a server started with [`HttpServer::spawn`]
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for in-flight requests
    pub async fn stop(mut self) -> std::io::Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::new(std::io::ErrorKind::Other, e)),
        }
    }
}

/// Catch-all handler for every request
async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let method = parts.method.as_str().to_uppercase();
    let path = parts.uri.path().to_string();
    let origin = parts.headers.get(ORIGIN).cloned();

    let (entry, path_parameters) = match state.routes.match_request(&method, &path) {
        RouteMatch::Matched {
            entry,
            path_parameters,
        } => (entry.clone(), path_parameters),
        RouteMatch::NotFound => {
            info!(
                event = "route_not_found",
                method = %method,
                path = %path,
                "No route for {} {}",
                method,
                path
            );
            return not_found_response(&method, &path, &state.routes.listing(), origin.as_ref());
        }
    };

    match entry.target {
        RouteTarget::Preflight => preflight_response(&parts.headers),
        RouteTarget::Async(descriptor) => {
            let body = match read_body(body, state.max_body_bytes).await {
                Ok(body) => body,
                Err(e) => return body_error_response(e, &method, &path, state.max_body_bytes),
            };
            let event = async_event(&descriptor, &body);
            state.invoker.spawn_detached(descriptor, event);
            accepted_response()
        }
        RouteTarget::Sync(descriptor) => {
            info!(
                event = "request_received",
                method = %method,
                path = %path,
                function = %descriptor.name,
                "Received Request {} {}",
                method,
                path
            );
            let body = match read_body(body, state.max_body_bytes).await {
                Ok(body) => body,
                Err(e) => return body_error_response(e, &method, &path, state.max_body_bytes),
            };

            let source = EventSource {
                method: &entry.method,
                resource_path: &descriptor.resource_path,
                stage: &state.stage,
                headers: &parts.headers,
                query: parts.uri.query(),
                path_parameters,
                body: &body,
                source_ip: source_ip(&parts),
                received_at: Utc::now(),
            };
            let event = InvocationEvent::synthesize(source, &IdentityOverrides::from_env());

            let outcome = match serde_json::to_value(&event) {
                Ok(event) => state.invoker.invoke(&descriptor, event).await,
                Err(e) => Err(FunctionError::HandlerThrew(HandlerError::from_error(&e))),
            };
            match outcome.and_then(|result| marshal_result(result, origin.as_ref())) {
                Ok(response) => response,
                Err(e) => error_response(&e, origin.as_ref()),
            }
        }
    }
}

#[derive(Debug)]
enum BodyError {
    TooLarge,
    Read(axum::Error),
}

/// Collect the request body, stopping once it grows past `limit`
async fn read_body(body: Body, limit: usize) -> Result<Vec<u8>, BodyError> {
    let mut stream = body.into_data_stream();
    let mut buffer = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(BodyError::Read)?;
        if buffer.len() + chunk.len() > limit {
            return Err(BodyError::TooLarge);
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer)
}

fn body_error_response(error: BodyError, method: &str, path: &str, limit: usize) -> Response {
    match error {
        BodyError::TooLarge => payload_too_large_response(limit),
        BodyError::Read(e) => {
            warn!(
                event = "request_body_unreadable",
                method = %method,
                path = %path,
                error = %e,
                "Failed to read request body for {} {}: {}",
                method,
                path,
                e
            );
            unreadable_body_response(&e.to_string())
        }
    }
}

fn source_ip(parts: &Parts) -> String {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| FALLBACK_SOURCE_IP.to_string())
}

/// Event for an async function: the body parsed as JSON.
/// A body that is not JSON is passed through as a string.
fn async_event(descriptor: &FunctionDescriptor, body: &[u8]) -> Value {
    let body = if body.is_empty() {
        EMPTY_BODY.as_bytes()
    } else {
        body
    };
    match serde_json::from_slice(body) {
        Ok(event) => event,
        Err(e) => {
            warn!(
                event = "async_body_not_json",
                function = %descriptor.name,
                error = %e,
                "Async request body for {} is not JSON, passing it as a string",
                descriptor.name
            );
            Value::String(String::from_utf8_lossy(body).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::{sync_handler_fn, StaticResolver};
    use serde_json::json;

    fn table() -> HandlerTable {
        HandlerTable::from_static(
            &StaticResolver::new()
                .with(
                    "users_get",
                    sync_handler_fn(|_, _, _| Ok(Some(json!({"body": "[]"})))),
                )
                .with("notify", sync_handler_fn(|_, _, _| Ok(None))),
        )
    }

    #[test]
    fn test_server_creation() {
        let server = HttpServer::new(EmulatorConfig::default(), table()).unwrap();
        assert_eq!(server.socket_addr(), "0.0.0.0:3003");
        assert_eq!(
            server.routes().listing(),
            vec!["POST - /dev/notify", "GET - /dev/users", "OPTIONS - /dev/users"]
        );
    }

    #[test]
    fn test_empty_table_is_rejected() {
        assert!(matches!(
            HttpServer::new(EmulatorConfig::default(), HandlerTable::default()),
            Err(FunctionError::StartupNoFunctions(_))
        ));
    }

    #[test]
    fn test_empty_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("lambdas")).unwrap();
        let config = EmulatorConfig {
            root: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(matches!(
            HttpServer::from_directory(config),
            Err(FunctionError::StartupNoFunctions(_))
        ));
    }

    #[tokio::test]
    async fn test_read_body_limits() {
        assert_eq!(read_body(Body::from("12345678"), 8).await.unwrap(), b"12345678");
        assert!(matches!(
            read_body(Body::from("123456789"), 8).await,
            Err(BodyError::TooLarge)
        ));
        assert!(read_body(Body::empty(), 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_body_stream_failure_is_not_too_large() {
        let chunks: Vec<Result<&'static str, std::io::Error>> = vec![
            Ok("partial"),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionAborted,
                "client went away",
            )),
        ];
        let body = Body::from_stream(futures_util::stream::iter(chunks));
        assert!(matches!(read_body(body, 1024).await, Err(BodyError::Read(_))));
    }

    #[test]
    fn test_async_event_parsing() {
        let descriptor = FunctionDescriptor::parse("notify");
        assert_eq!(async_event(&descriptor, b""), json!({}));
        assert_eq!(async_event(&descriptor, br#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(async_event(&descriptor, b"plain text"), json!("plain text"));
    }

    #[tokio::test]
    async fn test_spawn_and_stop() {
        let config = EmulatorConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..Default::default()
        };
        let handle = HttpServer::new(config, table()).unwrap().spawn().await.unwrap();
        assert_ne!(handle.local_addr().port(), 0);
        handle.stop().await.unwrap();
    }
}
