//! # Functions Module
//!
//! Handler functions discovered by name, the arguments synthesized for
//! them, and the rules applied to what they return.

pub mod context;
pub mod descriptor;
pub mod errors;
pub mod event;
pub mod executable;
pub mod handler;
pub mod invoker;
pub mod registry;
pub mod result;

pub use context::InvocationContext;
pub use descriptor::{FunctionDescriptor, InvocationMode};
pub use errors::{FunctionError, FunctionResult};
pub use event::{EventSource, IdentityOverrides, InvocationEvent};
pub use executable::{ExecutableHandler, ExecutableResolver};
pub use handler::{
    handler_fn, sync_handler_fn, Callback, Handler, HandlerError, HandlerFuture, HandlerOutput,
};
pub use invoker::Invoker;
pub use registry::{discover_function_names, HandlerResolver, HandlerSlot, HandlerTable, StaticResolver};
pub use result::InvocationResult;
