//! Agent result types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::error::AgentError;

/// Status an agent reports on success.
pub const STATUS_COMPLETED: &str = "completed";
/// Status assigned to every unsuccessful invocation.
pub const STATUS_FAILED: &str = "failed";

/// Structured result of one agent invocation.
///
/// Agents print this object on stdout. Fields beyond the three required ones are
/// kept in `extra` and survive a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_type: String,
    pub status: String,
    pub output: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AgentResult {
    pub fn new(agent_type: impl Into<String>, status: impl Into<String>, output: Value) -> Self {
        Self {
            agent_type: agent_type.into(),
            status: status.into(),
            output,
            extra: Map::new(),
        }
    }

    pub fn completed(agent_type: impl Into<String>, output: Value) -> Self {
        Self::new(agent_type, STATUS_COMPLETED, output)
    }

    pub fn failed(agent_type: impl Into<String>, output: Value) -> Self {
        Self::new(agent_type, STATUS_FAILED, output)
    }

    /// Only "completed" counts as success; any other status fails the task.
    pub fn is_success(&self) -> bool {
        self.status == STATUS_COMPLETED
    }

    /// Parse the stdout of a successful agent process.
    ///
    /// Output that is not a single result object is wrapped in a completed result
    /// carrying the raw text.
    pub fn from_stdout(agent_type: &str, stdout: &str) -> Self {
        match serde_json::from_str::<AgentResult>(stdout.trim()) {
            Ok(result) => result,
            Err(_) => Self::completed(
                agent_type,
                json!({
                    "stdout": stdout,
                    "summary": format!("Agent {} completed successfully", agent_type),
                }),
            ),
        }
    }

    /// Failed result describing an invocation error.
    pub fn from_error(agent_type: &str, error: &AgentError) -> Self {
        let output = match error {
            AgentError::ExecutionFailed { code, stderr } => {
                let message = if stderr.trim().is_empty() {
                    "Unknown error".to_string()
                } else {
                    stderr.clone()
                };
                json!({ "error": message, "return_code": code })
            }
            AgentError::Timeout { .. } => json!({ "error": error.to_string(), "timed_out": true }),
            _ => json!({ "error": error.to_string() }),
        };
        Self::failed(agent_type, output)
    }

    /// Failed result for an invocation that panicked.
    pub fn from_panic(agent_type: &str, message: &str) -> Self {
        Self::failed(
            agent_type,
            json!({ "error": format!("agent execution panicked: {}", message) }),
        )
    }

    /// Whether the invocation was cut short by the timeout.
    pub fn timed_out(&self) -> bool {
        self.output
            .get("timed_out")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
