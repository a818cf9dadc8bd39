//! # Handler Capability
//!
//! A handler is called with `(event, context, callback)` and produces an
//! optional result value, either immediately or after suspending. Both shapes
//! are expressed through the same boxed future so the dispatcher never needs
//! to know which one it got.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::future::Future;

use futures_util::future::{self, BoxFuture, FutureExt};
use serde_json::{json, Value};

use super::context::InvocationContext;

/// What a handler resolves to. `Ok(None)` is a handler that returned nothing.
pub type HandlerOutput = Result<Option<Value>, HandlerError>;

/// Future returned by every handler
pub type HandlerFuture = BoxFuture<'static, HandlerOutput>;

/// A unit of user logic invoked per request
pub trait Handler: Send + Sync {
    fn call(&self, event: Value, context: InvocationContext, callback: Callback) -> HandlerFuture;
}

/// Legacy completion callback passed as the third handler argument.
///
/// Calling it never fails and never changes the dispatch outcome; only the
/// value the handler resolves to is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct Callback;

impl Callback {
    pub fn call(&self, _error: Option<&HandlerError>, _result: Option<&Value>) -> Value {
        json!({})
    }
}

/// Error raised by a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    /// Kind name surfaced as `errorType`
    pub kind: String,

    /// Human readable message surfaced as `errorMessage`
    pub message: String,

    /// Multi-line stack, first line is `kind: message`
    pub stack: String,
}

impl HandlerError {
    /// Create an error with an explicit kind name
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        let kind = kind.into();
        let message = message.into();
        let stack = capture_stack(&kind, &message, &[]);
        Self {
            kind,
            message,
            stack,
        }
    }

    /// Replace the captured stack
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = stack.into();
        self
    }

    /// Build from any error, using the error type's short name as the kind
    pub fn from_error<E>(error: &E) -> Self
    where
        E: std::error::Error + 'static,
    {
        let kind = short_type_name::<E>();
        let message = error.to_string();

        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(format!("Caused by: {}", cause));
            source = cause.source();
        }

        let stack = capture_stack(&kind, &message, &causes);
        Self {
            kind,
            message,
            stack,
        }
    }

    /// Build from the payload of a panicking handler
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "handler panicked".to_string()
        };
        Self::new("Panic", message)
    }

    /// Stack split into trimmed lines, never empty
    pub fn stack_trace(&self) -> Vec<String> {
        let lines: Vec<String> = self
            .stack
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        if lines.is_empty() {
            vec![format!("{}: {}", self.kind, self.message)]
        } else {
            lines
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for HandlerError {}

fn capture_stack(kind: &str, message: &str, causes: &[String]) -> String {
    let mut stack = format!("{}: {}", kind, message);
    for cause in causes {
        stack.push('\n');
        stack.push_str(cause);
    }
    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        stack.push('\n');
        stack.push_str(&backtrace.to_string());
    }
    stack
}

fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// Handler backed by an async closure
pub struct HandlerFn<F> {
    f: F,
}

/// Wrap an async closure as a [`Handler`]
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Value, InvocationContext, Callback) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerOutput> + Send + 'static,
{
    HandlerFn { f }
}

impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Value, InvocationContext, Callback) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerOutput> + Send + 'static,
{
    fn call(&self, event: Value, context: InvocationContext, callback: Callback) -> HandlerFuture {
        (self.f)(event, context, callback).boxed()
    }
}

/// Handler backed by a closure that returns its result directly
pub struct SyncHandlerFn<F> {
    f: F,
}

/// Wrap a plain closure as a [`Handler`]. Its return value is treated as
/// already resolved.
pub fn sync_handler_fn<F>(f: F) -> SyncHandlerFn<F>
where
    F: Fn(Value, InvocationContext, Callback) -> HandlerOutput + Send + Sync,
{
    SyncHandlerFn { f }
}

impl<F> Handler for SyncHandlerFn<F>
where
    F: Fn(Value, InvocationContext, Callback) -> HandlerOutput + Send + Sync,
{
    fn call(&self, event: Value, context: InvocationContext, callback: Callback) -> HandlerFuture {
        future::ready((self.f)(event, context, callback)).boxed()
    }
}
