//! Task model: one unit of work for a (ticket, agent type) pair.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ticket priority names and the score each one maps to.
pub const PRIORITY_SCORES: &[(&str, u32)] = &[
    ("critical", 100),
    ("high", 75),
    ("medium", 50),
    ("low", 25),
    ("backlog", 10),
];

/// Score used for priority names not in [`PRIORITY_SCORES`].
pub const DEFAULT_PRIORITY_SCORE: u32 = 50;

/// Map a ticket priority name to its numeric score.
pub fn priority_score(name: &str) -> u32 {
    PRIORITY_SCORES
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, score)| *score)
        .unwrap_or(DEFAULT_PRIORITY_SCORE)
}

/// Identity of a task. Unique among live tasks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskKey {
    pub ticket_id: String,
    pub agent_type: String,
}

impl TaskKey {
    pub fn new(ticket_id: impl Into<String>, agent_type: impl Into<String>) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            agent_type: agent_type.into(),
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ticket_id, self.agent_type)
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Blocked,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Blocked => "blocked",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Completed and failed tasks never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work routed to one agent type for one ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub ticket_id: String,
    pub agent_type: String,
    /// Higher runs first when the queue is in priority mode.
    pub priority: u32,
    /// Agent types that must have completed work before this task may run.
    pub dependencies: Vec<String>,
    /// Informational only; never used for scheduling.
    pub estimated_duration_mins: u32,
    pub status: TaskStatus,
    pub assigned_agent: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub completion_time: Option<DateTime<Utc>>,
    /// Number of executor invocations made so far.
    pub attempts: u32,
}

impl Task {
    pub fn new(ticket_id: impl Into<String>, agent_type: impl Into<String>, priority: u32) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            agent_type: agent_type.into(),
            priority,
            dependencies: Vec::new(),
            estimated_duration_mins: 0,
            status: TaskStatus::Pending,
            assigned_agent: None,
            start_time: None,
            completion_time: None,
            attempts: 0,
        }
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_estimated_duration(mut self, minutes: u32) -> Self {
        self.estimated_duration_mins = minutes;
        self
    }

    pub fn key(&self) -> TaskKey {
        TaskKey::new(&self.ticket_id, &self.agent_type)
    }

    /// Wall-clock run time, available once the task has finished.
    pub fn duration(&self) -> Option<Duration> {
        match (self.start_time, self.completion_time) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}
