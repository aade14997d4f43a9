//! Types for the ticket dispatcher.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::task::{Task, TaskKey};

/// Errors that can occur while submitting or dispatching tasks.
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Invalid ticket or pool configuration (unknown agent type, missing ticket id).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A live task with the same identity already exists.
    #[error("task already queued or running: {ticket_id}/{agent_type}")]
    DuplicateTask {
        ticket_id: String,
        agent_type: String,
    },

    /// Ticket store error.
    #[error("ticket store error: {0}")]
    TicketStore(#[from] crate::ticket::TicketError),

    /// The dispatcher is not running.
    #[error("dispatcher is not running")]
    NotRunning,

    /// The dispatcher was already started.
    #[error("dispatcher is already running")]
    AlreadyRunning,
}

/// Status of one agent pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolStatus {
    /// Agent type the pool serves.
    pub name: String,
    /// Permits currently held.
    pub active_jobs: usize,
    /// Pool limit.
    pub max_concurrent: usize,
    /// Callers suspended in `acquire`.
    pub queued_jobs: usize,
    /// Tasks finished through this pool since startup.
    pub total_processed: u64,
    /// Of those, how many failed.
    pub total_failed: u64,
}

/// Snapshot of the dispatcher's work counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatcherStatus {
    /// Whether the coordinator loop is running.
    pub running: bool,
    /// Tasks currently in progress.
    pub active: usize,
    /// Tasks parked until their dependencies complete.
    pub blocked: usize,
    /// Tasks finished successfully.
    pub completed: usize,
    /// Tasks finished unsuccessfully.
    pub failed: usize,
    /// Tasks in the ready region of the queue.
    pub queue_size: usize,
    /// Per agent type pool status, sorted by name.
    pub pools: Vec<PoolStatus>,
}

impl DispatcherStatus {
    /// Nothing is ready and nothing is running. Blocked tasks may remain.
    pub fn is_idle(&self) -> bool {
        self.active == 0 && self.queue_size == 0
    }

    /// No task is left in any non-terminal state.
    pub fn is_drained(&self) -> bool {
        self.is_idle() && self.blocked == 0
    }
}

/// Task lifecycle notifications broadcast to subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DispatcherEvent {
    TaskQueued { key: TaskKey },
    TaskBlocked { key: TaskKey, waiting_on: Vec<String> },
    TaskUnblocked { key: TaskKey },
    TaskStarted { key: TaskKey },
    TaskCompleted { task: Task },
    TaskFailed { task: Task },
}

impl DispatcherEvent {
    pub fn key(&self) -> TaskKey {
        match self {
            DispatcherEvent::TaskQueued { key }
            | DispatcherEvent::TaskBlocked { key, .. }
            | DispatcherEvent::TaskUnblocked { key }
            | DispatcherEvent::TaskStarted { key } => key.clone(),
            DispatcherEvent::TaskCompleted { task } | DispatcherEvent::TaskFailed { task } => {
                task.key()
            }
        }
    }
}
