//! Tracks which agent types have completed work.

use std::collections::{BTreeSet, HashSet};

use super::config::ReadinessScope;
use super::task::Task;

/// Answers whether a task's dependencies have been satisfied.
///
/// Completions are recorded per agent type and per (ticket, agent type) pair.
/// The configured scope decides which of the two sets `is_ready` consults.
#[derive(Debug, Clone, Default)]
pub struct ReadinessTracker {
    scope: ReadinessScope,
    completed_types: BTreeSet<String>,
    completed_by_ticket: HashSet<(String, String)>,
}

impl ReadinessTracker {
    pub fn new(scope: ReadinessScope) -> Self {
        Self {
            scope,
            ..Default::default()
        }
    }

    pub fn scope(&self) -> ReadinessScope {
        self.scope
    }

    pub fn is_ready(&self, task: &Task) -> bool {
        self.missing_dependencies(task).is_empty()
    }

    /// Dependencies of the task not yet satisfied.
    pub fn missing_dependencies(&self, task: &Task) -> Vec<String> {
        task.dependencies
            .iter()
            .filter(|dep| !self.is_satisfied(&task.ticket_id, dep))
            .cloned()
            .collect()
    }

    fn is_satisfied(&self, ticket_id: &str, agent_type: &str) -> bool {
        match self.scope {
            ReadinessScope::Global => self.completed_types.contains(agent_type),
            ReadinessScope::Ticket => self
                .completed_by_ticket
                .contains(&(ticket_id.to_string(), agent_type.to_string())),
        }
    }

    /// Record a completed task. Idempotent.
    pub fn record_completed(&mut self, task: &Task) {
        self.record_completion(&task.ticket_id, &task.agent_type);
    }

    /// Record a completion known from elsewhere, such as a stored progress log.
    pub fn record_completion(&mut self, ticket_id: &str, agent_type: &str) {
        self.completed_types.insert(agent_type.to_string());
        self.completed_by_ticket
            .insert((ticket_id.to_string(), agent_type.to_string()));
    }

    /// Agent types with at least one completed task, sorted.
    pub fn completed_agent_types(&self) -> Vec<String> {
        self.completed_types.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(ticket: &str, agent: &str, deps: &[&str]) -> Task {
        Task::new(ticket, agent, 50).with_dependencies(deps.iter().copied())
    }

    #[test]
    fn test_empty_dependencies_always_ready() {
        let tracker = ReadinessTracker::new(ReadinessScope::Global);
        assert!(tracker.is_ready(&task("T-1", "content", &[])));

        let tracker = ReadinessTracker::new(ReadinessScope::Ticket);
        assert!(tracker.is_ready(&task("T-1", "content", &[])));
    }

    #[test]
    fn test_ready_once_all_dependencies_complete() {
        let mut tracker = ReadinessTracker::default();
        let qa = task("T-1", "qa", &["development", "asset"]);

        assert!(!tracker.is_ready(&qa));
        assert_eq!(tracker.missing_dependencies(&qa), vec!["development", "asset"]);

        tracker.record_completed(&task("T-1", "development", &[]));
        assert!(!tracker.is_ready(&qa));
        assert_eq!(tracker.missing_dependencies(&qa), vec!["asset"]);

        tracker.record_completed(&task("T-1", "asset", &[]));
        assert!(tracker.is_ready(&qa));
    }

    #[test]
    fn test_global_scope_crosses_tickets() {
        let mut tracker = ReadinessTracker::new(ReadinessScope::Global);
        tracker.record_completed(&task("T-A", "content", &[]));

        assert!(tracker.is_ready(&task("T-B", "asset", &["content"])));
    }

    #[test]
    fn test_ticket_scope_requires_same_ticket() {
        let mut tracker = ReadinessTracker::new(ReadinessScope::Ticket);
        tracker.record_completed(&task("T-A", "content", &[]));

        assert!(!tracker.is_ready(&task("T-B", "asset", &["content"])));
        assert!(tracker.is_ready(&task("T-A", "asset", &["content"])));
    }

    #[test]
    fn test_record_completed_is_idempotent() {
        let mut tracker = ReadinessTracker::default();
        let content = task("T-1", "content", &[]);
        tracker.record_completed(&content);
        tracker.record_completed(&content);
        tracker.record_completed(&task("T-2", "content", &[]));

        assert_eq!(tracker.completed_agent_types(), vec!["content"]);
    }

    #[test]
    fn test_restored_completion_satisfies_both_scopes() {
        let asset = task("T-1", "asset", &["content"]);

        let mut tracker = ReadinessTracker::new(ReadinessScope::Ticket);
        tracker.record_completion("T-1", "content");
        assert!(tracker.is_ready(&asset));
        assert!(!tracker.is_ready(&task("T-2", "asset", &["content"])));

        let mut tracker = ReadinessTracker::new(ReadinessScope::Global);
        tracker.record_completion("T-1", "content");
        assert!(tracker.is_ready(&task("T-2", "asset", &["content"])));
    }
}
