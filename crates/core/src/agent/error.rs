//! Error types for the agent module.

use thiserror::Error;

/// Errors that can occur while invoking an agent process.
///
/// These never escape the dispatcher: each one is folded into a failed
/// [`AgentResult`](super::AgentResult) for the task that hit it.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No command is registered for the agent type.
    #[error("no agent command registered for agent type '{agent_type}'")]
    UnknownAgentType { agent_type: String },

    /// The agent process could not be started.
    #[error("failed to spawn agent '{program}': {reason}")]
    SpawnFailed { program: String, reason: String },

    /// The agent process exited unsuccessfully.
    #[error("agent exited with code {code:?}")]
    ExecutionFailed { code: Option<i32>, stderr: String },

    /// The agent process ran longer than allowed and was killed.
    #[error("agent timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// I/O error while preparing the invocation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Creates a new spawn failed error.
    pub fn spawn_failed(program: impl Into<String>, reason: impl ToString) -> Self {
        Self::SpawnFailed {
            program: program.into(),
            reason: reason.to_string(),
        }
    }
}
