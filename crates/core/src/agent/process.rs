//! Executor that runs each agent as an external process.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::config::AgentCommand;
use super::error::AgentError;
use super::traits::Executor;
use super::types::AgentResult;
use crate::dispatcher::Task;

/// Spawns the program registered for a task's agent type.
///
/// The process runs in the project root with stdin closed and both output
/// streams captured. It is killed if the returned future is dropped, which is
/// how the dispatcher's timeout ends a runaway agent.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    project_root: PathBuf,
    commands: BTreeMap<String, AgentCommand>,
}

impl ProcessExecutor {
    pub fn new(project_root: impl Into<PathBuf>, commands: BTreeMap<String, AgentCommand>) -> Self {
        Self {
            project_root: project_root.into(),
            commands,
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    fn command_for(&self, agent_type: &str) -> Result<&AgentCommand, AgentError> {
        self.commands
            .get(agent_type)
            .ok_or_else(|| AgentError::UnknownAgentType {
                agent_type: agent_type.to_string(),
            })
    }

    async fn invoke(&self, task: &Task) -> Result<AgentResult, AgentError> {
        let command = self.command_for(&task.agent_type)?;

        debug!(
            ticket_id = %task.ticket_id,
            agent_type = %task.agent_type,
            program = %command.program,
            "Spawning agent process"
        );

        let output = Command::new(&command.program)
            .args(&command.args)
            .arg(&task.ticket_id)
            .envs(&command.env)
            .current_dir(&self.project_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AgentError::spawn_failed(&command.program, e))?;

        classify_output(
            &task.agent_type,
            output.status.code(),
            &output.stdout,
            &output.stderr,
        )
    }
}

/// Map a finished process to its result. A missing exit code (killed by a
/// signal) counts as failure.
fn classify_output(
    agent_type: &str,
    exit_code: Option<i32>,
    stdout: &[u8],
    stderr: &[u8],
) -> Result<AgentResult, AgentError> {
    if exit_code == Some(0) {
        let stdout = String::from_utf8_lossy(stdout);
        Ok(AgentResult::from_stdout(agent_type, &stdout))
    } else {
        Err(AgentError::ExecutionFailed {
            code: exit_code,
            stderr: String::from_utf8_lossy(stderr).into_owned(),
        })
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    fn name(&self) -> &str {
        "process"
    }

    async fn run(&self, task: &Task) -> AgentResult {
        match self.invoke(task).await {
            Ok(result) => result,
            Err(e) => AgentResult::from_error(&task.agent_type, &e),
        }
    }

    async fn validate(&self) -> Result<(), AgentError> {
        let metadata = tokio::fs::metadata(&self.project_root).await?;
        if !metadata.is_dir() {
            return Err(AgentError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("project root is not a directory: {}", self.project_root.display()),
            )));
        }

        for (agent_type, command) in &self.commands {
            if command.program.trim().is_empty() {
                return Err(AgentError::spawn_failed(
                    "",
                    format!("empty program for agent type '{}'", agent_type),
                ));
            }

            // Bare names are resolved through PATH at spawn time.
            if command.program.contains('/') {
                let program = self.project_root.join(&command.program);
                if !program.exists() {
                    return Err(AgentError::spawn_failed(
                        &command.program,
                        format!("program not found at {}", program.display()),
                    ));
                }
            }
        }

        Ok(())
    }
}
