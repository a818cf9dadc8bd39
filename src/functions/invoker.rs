//! # Function Invoker
//!
//! Runs handlers for the dispatcher: synchronously, returning the validated
//! result, or detached, with the outcome only logged.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::context::InvocationContext;
use super::descriptor::FunctionDescriptor;
use super::errors::{FunctionError, FunctionResult};
use super::handler::{Callback, Handler, HandlerError, HandlerOutput};
use super::registry::HandlerTable;
use super::result::InvocationResult;

/// Delay before a detached invocation starts, so the 202 is written first
pub const ASYNC_START_DELAY: Duration = Duration::from_millis(1);

/// Function invoker
#[derive(Debug, Clone)]
pub struct Invoker {
    table: Arc<HandlerTable>,
}

impl Invoker {
    /// Create a new invoker
    pub fn new(table: Arc<HandlerTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &HandlerTable {
        &self.table
    }

    /// Handler for `name`
    pub fn handler(&self, name: &str) -> FunctionResult<Arc<dyn Handler>> {
        self.table.resolve(name)
    }

    /// Invoke a sync function and validate what it returned
    pub async fn invoke(
        &self,
        descriptor: &FunctionDescriptor,
        event: Value,
    ) -> FunctionResult<InvocationResult> {
        let handler = self.handler(&descriptor.name).map_err(|e| {
            error!(
                event = "handler_not_found",
                function = %descriptor.name,
                error_type = e.error_type(),
                "{}",
                e
            );
            e
        })?;

        let started = Instant::now();
        let outcome = call(handler, &descriptor.name, event, started).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            event = "function_executed",
            function = %descriptor.name,
            method = descriptor.route_method(),
            elapsed_ms,
            "Executed {} {} in {}ms",
            descriptor.route_method(),
            descriptor.name,
            elapsed_ms
        );

        let result = outcome.and_then(InvocationResult::from_value);
        if let Err(e) = &result {
            error!(
                event = "function_failed",
                function = %descriptor.name,
                error_type = e.error_type(),
                "{}",
                e
            );
        }
        result
    }

    /// Invoke an async function in the background. The caller does not wait
    /// for it and the outcome is only logged.
    pub fn spawn_detached(&self, descriptor: FunctionDescriptor, event: Value) -> JoinHandle<()> {
        let invoker = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ASYNC_START_DELAY).await;

            let handler = match invoker.handler(&descriptor.name) {
                Ok(handler) => handler,
                Err(e) => {
                    warn!(
                        event = "async_handler_not_found",
                        function = %descriptor.name,
                        "{}",
                        e
                    );
                    return;
                }
            };

            let started = Instant::now();
            let outcome = call(handler, &descriptor.name, event, started).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            info!(
                event = "async_function_executed",
                function = %descriptor.name,
                elapsed_ms,
                "Executed async {} in {}ms",
                descriptor.name,
                elapsed_ms
            );

            if let Err(e) = outcome {
                error!(
                    event = "async_function_failed",
                    function = %descriptor.name,
                    error_type = e.error_type(),
                    "{}",
                    e
                );
            }
        })
    }
}

/// Call the handler on its own task so a panic is caught and reported as a
/// thrown error.
async fn call(
    handler: Arc<dyn Handler>,
    function_name: &str,
    event: Value,
    started: Instant,
) -> FunctionResult<Option<Value>> {
    let context = InvocationContext::new(function_name, started);

    let output: HandlerOutput =
        match tokio::spawn(async move { handler.call(event, context, Callback).await }).await {
            Ok(output) => output,
            Err(join_error) => match join_error.try_into_panic() {
                Ok(payload) => Err(HandlerError::from_panic(payload)),
                Err(join_error) => Err(HandlerError::from_error(&join_error)),
            },
        };

    output.map_err(FunctionError::HandlerThrew)
}
