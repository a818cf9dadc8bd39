//! # Invocation Context
//!
//! The second handler argument: a description of the simulated execution
//! environment with a fixed timeout window.

use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

/// Advisory execution window surfaced to handlers
pub const EXECUTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Reported memory limit
pub const MEMORY_LIMIT_IN_MB: &str = "128";

/// Reported function version
pub const FUNCTION_VERSION: &str = "$LATEST";

/// Invocation context passed to handlers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationContext {
    /// Fresh per invocation
    pub aws_request_id: String,

    pub callback_waits_for_empty_event_loop: bool,

    pub function_name: String,

    pub function_version: String,

    pub invoked_function_arn: String,

    pub log_group_name: String,

    pub log_stream_name: String,

    #[serde(rename = "memoryLimitInMB")]
    pub memory_limit_in_mb: String,

    /// Wall-clock deadline in epoch milliseconds, for out-of-process handlers
    pub deadline_ms: i64,

    #[serde(skip)]
    deadline: Instant,
}

impl InvocationContext {
    /// Create a context for an invocation that started at `started`
    pub fn new(function_name: &str, started: Instant) -> Self {
        let deadline = started + EXECUTION_TIMEOUT;
        let remaining = deadline.saturating_duration_since(Instant::now());
        let deadline_ms = Utc::now().timestamp_millis() + remaining.as_millis() as i64;

        Self {
            aws_request_id: Uuid::new_v4().to_string(),
            callback_waits_for_empty_event_loop: true,
            function_name: function_name.to_string(),
            function_version: FUNCTION_VERSION.to_string(),
            invoked_function_arn: format!("offline_invokedFunctionArn_for_{}", function_name),
            log_group_name: format!("offline_logGroupName_for_{}", function_name),
            log_stream_name: format!("offline_logStreamName_for_{}", function_name),
            memory_limit_in_mb: MEMORY_LIMIT_IN_MB.to_string(),
            deadline_ms,
            deadline,
        }
    }

    /// Milliseconds left before the advisory deadline, clamped at zero.
    ///
    /// Recomputed on every call.
    pub fn get_remaining_time_in_millis(&self) -> u64 {
        self.deadline
            .saturating_duration_since(Instant::now())
            .as_millis() as u64
    }

    /// Monotonic deadline of this invocation
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    // Deprecated completion hooks, kept for handlers that still call them.

    pub fn done(&self) {}

    pub fn fail(&self) {}

    pub fn succeed(&self) {}
}
