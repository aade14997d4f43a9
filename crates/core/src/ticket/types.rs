//! Ticket record and progress types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ticket type used when a record does not declare one.
pub const DEFAULT_TICKET_TYPE: &str = "development";
/// Priority name used when a record does not declare one.
pub const DEFAULT_PRIORITY: &str = "medium";
/// Status of a ticket that is waiting to be worked on.
pub const STATUS_ACTIVE: &str = "active";
/// Status the dispatcher sets once the first task of a ticket starts.
pub const STATUS_IN_PROGRESS: &str = "in_progress";

/// A decoded ticket, as the dispatcher consumes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRecord {
    /// Unique ticket identifier. Must not be empty.
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "default_ticket_type")]
    pub ticket_type: String,
    /// Priority name (critical, high, medium, low, backlog).
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(default = "default_status")]
    pub status: String,
    /// Free-form labels, matched exactly against the task rules.
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_ticket_type() -> String {
    DEFAULT_TICKET_TYPE.to_string()
}

fn default_priority() -> String {
    DEFAULT_PRIORITY.to_string()
}

fn default_status() -> String {
    STATUS_ACTIVE.to_string()
}

impl TicketRecord {
    pub fn new(id: impl Into<String>, ticket_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ticket_type: ticket_type.into(),
            priority: default_priority(),
            status: default_status(),
            tags: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = priority.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// One append-only progress entry, written when a task finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub id: String,
    pub ticket_id: String,
    pub agent_type: String,
    /// Status reported by the agent ("completed", "failed", ...).
    pub status: String,
    /// The agent's `output` payload.
    pub result: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

/// Progress entry to append.
#[derive(Debug, Clone)]
pub struct NewProgressEntry {
    pub ticket_id: String,
    pub agent_type: String,
    pub status: String,
    pub result: serde_json::Value,
}
