//! # Executable Handlers
//!
//! Handlers built ahead of time as standalone programs. One process is
//! spawned per invocation: the request arrives on stdin as
//! `{"event": ..., "context": ...}` and the result is read back from stdout.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use futures_util::future::FutureExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::context::{InvocationContext, MEMORY_LIMIT_IN_MB};
use super::handler::{Callback, Handler, HandlerError, HandlerFuture, HandlerOutput};
use super::registry::HandlerResolver;

/// Kind reported when a handler process fails without a structured error
pub const PROCESS_EXIT_KIND: &str = "ProcessExit";

/// Resolves function names to executables in a handlers directory
#[derive(Debug, Clone)]
pub struct ExecutableResolver {
    dir: PathBuf,
}

impl ExecutableResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the executable for `name`, if one exists
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        let plain = self.dir.join(name);
        let suffixed = self
            .dir
            .join(format!("{}{}", name, std::env::consts::EXE_SUFFIX));
        [plain, suffixed]
            .into_iter()
            .find(|candidate| is_executable(candidate))
    }
}

impl HandlerResolver for ExecutableResolver {
    fn resolve(&self, name: &str) -> Option<Arc<dyn Handler>> {
        let path = self.locate(name)?;
        debug!(
            event = "handler_resolved",
            function = name,
            path = %path.display(),
            "Resolved executable handler"
        );
        Some(Arc::new(ExecutableHandler::new(name, path)))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// A handler that runs an executable per invocation
#[derive(Debug, Clone)]
pub struct ExecutableHandler {
    name: String,
    path: PathBuf,
}

/// Structured error a handler process may print before exiting non-zero
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessErrorReport {
    error_type: String,
    #[serde(default)]
    error_message: String,
    #[serde(default)]
    stack_trace: Vec<String>,
}

impl ExecutableHandler {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn run(self, event: Value, context: InvocationContext) -> HandlerOutput {
        let input = serde_json::to_vec(&json!({ "event": event, "context": context }))
            .map_err(|e| HandlerError::from_error(&e))?;

        let mut child = Command::new(&self.path)
            .env("AWS_LAMBDA_FUNCTION_NAME", &context.function_name)
            .env("AWS_LAMBDA_FUNCTION_VERSION", &context.function_version)
            .env("AWS_LAMBDA_FUNCTION_MEMORY_SIZE", MEMORY_LIMIT_IN_MB)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HandlerError::from_error(&e))?;

        // Written from a separate task so a handler that never reads its
        // input cannot block on a full stdout pipe.
        let writer = child.stdin.take().map(|mut stdin| {
            tokio::spawn(async move {
                match stdin.write_all(&input).await {
                    Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => Err(e),
                    _ => Ok(()),
                }
            })
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| HandlerError::from_error(&e))?;

        if let Some(writer) = writer {
            if let Ok(Err(e)) = writer.await {
                warn!(
                    event = "handler_stdin_failed",
                    function = %self.name,
                    error = %e,
                    "Failed to write event to handler"
                );
            }
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().filter(|line| !line.trim().is_empty()) {
            debug!(event = "handler_stderr", function = %self.name, "{}", line);
        }

        if !output.status.success() {
            return Err(process_error(&output.status, &stdout, &stderr));
        }

        let stdout = stdout.trim();
        if stdout.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(stdout)
            .map(Some)
            .map_err(|e| HandlerError::from_error(&e))
    }
}

impl Handler for ExecutableHandler {
    fn call(&self, event: Value, context: InvocationContext, _callback: Callback) -> HandlerFuture {
        self.clone().run(event, context).boxed()
    }
}

fn process_error(status: &std::process::ExitStatus, stdout: &str, stderr: &str) -> HandlerError {
    let report = [stdout, stderr]
        .into_iter()
        .find_map(|stream| serde_json::from_str::<ProcessErrorReport>(stream.trim()).ok());

    match report {
        Some(report) => {
            let stack = report.stack_trace.join("\n");
            HandlerError::new(report.error_type, report.error_message).with_stack(stack)
        }
        None => {
            let message = match status.code() {
                Some(code) => format!("Handler exited with status {}", code),
                None => "Handler terminated by signal".to_string(),
            };
            let mut stack = format!("{}: {}", PROCESS_EXIT_KIND, message);
            for line in stderr.lines() {
                stack.push('\n');
                stack.push_str(line);
            }
            HandlerError::new(PROCESS_EXIT_KIND, message).with_stack(stack)
        }
    }
}
