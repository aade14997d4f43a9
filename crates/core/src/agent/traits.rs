//! Trait definitions for the agent module.

use async_trait::async_trait;

use super::error::AgentError;
use super::types::AgentResult;
use crate::dispatcher::Task;

/// Runs the agent for a task.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Returns the name of this executor implementation.
    fn name(&self) -> &str;

    /// Invoke the agent for the task and wait for its result.
    ///
    /// Invocation problems are reported as a failed result, not an error.
    async fn run(&self, task: &Task) -> AgentResult;

    /// Validates that the executor is properly configured and ready.
    async fn validate(&self) -> Result<(), AgentError>;
}
