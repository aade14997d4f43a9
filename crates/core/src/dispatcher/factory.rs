//! Derives the task list of a ticket from its tags.

use super::task::{priority_score, Task};
use super::types::DispatcherError;
use crate::ticket::TicketRecord;

/// How a rule's prerequisites become task dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrerequisiteMode {
    /// Each prerequisite derived earlier for the ticket is a dependency.
    #[default]
    EachDerived,
    /// Every prerequisite is a dependency once any of them was derived earlier.
    AllIfAnyDerived,
}

/// One row of the task rule table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRule {
    pub agent_type: String,
    /// The rule matches when any ticket tag is in this set.
    pub tags: Vec<String>,
    pub estimated_duration_mins: u32,
    /// Agent types this task depends on, subject to `prerequisite_mode`.
    pub prerequisites: Vec<String>,
    pub prerequisite_mode: PrerequisiteMode,
}

impl TaskRule {
    pub fn new(
        agent_type: &str,
        tags: &[&str],
        estimated_duration_mins: u32,
        prerequisites: &[&str],
    ) -> Self {
        Self {
            agent_type: agent_type.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            estimated_duration_mins,
            prerequisites: prerequisites.iter().map(|p| p.to_string()).collect(),
            prerequisite_mode: PrerequisiteMode::default(),
        }
    }

    pub fn with_prerequisite_mode(mut self, mode: PrerequisiteMode) -> Self {
        self.prerequisite_mode = mode;
        self
    }

    pub fn matches(&self, ticket: &TicketRecord) -> bool {
        ticket.tags.iter().any(|tag| self.tags.contains(tag))
    }

    /// Dependencies of this rule's task given the tasks derived before it.
    pub fn dependencies(&self, derived: &[Task]) -> Vec<String> {
        let is_derived = |agent_type: &String| derived.iter().any(|t| &t.agent_type == agent_type);

        match self.prerequisite_mode {
            PrerequisiteMode::EachDerived => self
                .prerequisites
                .iter()
                .filter(|p| is_derived(p))
                .cloned()
                .collect(),
            PrerequisiteMode::AllIfAnyDerived => {
                if self.prerequisites.iter().any(is_derived) {
                    self.prerequisites.clone()
                } else {
                    Vec::new()
                }
            }
        }
    }
}

/// Task emitted for a ticket no rule matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackRule {
    /// Only tickets of this type get the fallback task.
    pub ticket_type: String,
    pub agent_type: String,
    pub estimated_duration_mins: u32,
}

/// The built-in rule table, in evaluation order.
pub fn default_rules() -> Vec<TaskRule> {
    vec![
        TaskRule::new("content", &["content", "lesson", "educational"], 120, &[]),
        TaskRule::new(
            "development",
            &["development", "code", "bug", "feature"],
            180,
            &["content"],
        ),
        TaskRule::new("asset", &["assets", "images", "qr", "media"], 60, &["content"]),
        TaskRule::new("qa", &["qa", "testing", "validation"], 90, &["development", "asset"])
            .with_prerequisite_mode(PrerequisiteMode::AllIfAnyDerived),
        TaskRule::new(
            "infrastructure",
            &["infrastructure", "deployment", "r2", "github-actions"],
            240,
            &["qa"],
        ),
    ]
}

fn default_fallback() -> FallbackRule {
    FallbackRule {
        ticket_type: "development".to_string(),
        agent_type: "development".to_string(),
        estimated_duration_mins: 180,
    }
}

/// Pure mapping from a ticket record to its ordered task list.
#[derive(Debug, Clone)]
pub struct TaskFactory {
    rules: Vec<TaskRule>,
    fallback: FallbackRule,
}

impl Default for TaskFactory {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl TaskFactory {
    pub fn new(rules: Vec<TaskRule>) -> Self {
        Self {
            rules,
            fallback: default_fallback(),
        }
    }

    pub fn with_fallback(mut self, fallback: FallbackRule) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn rules(&self) -> &[TaskRule] {
        &self.rules
    }

    /// Every agent type this factory can emit, in rule order.
    pub fn agent_types(&self) -> Vec<String> {
        let mut types: Vec<String> = Vec::new();
        let candidates = self
            .rules
            .iter()
            .map(|r| &r.agent_type)
            .chain(std::iter::once(&self.fallback.agent_type));
        for agent_type in candidates {
            if !types.contains(agent_type) {
                types.push(agent_type.clone());
            }
        }
        types
    }

    /// Derive the tasks of a ticket. The result order is the queueing order.
    pub fn derive(&self, ticket: &TicketRecord) -> Result<Vec<Task>, DispatcherError> {
        if ticket.id.trim().is_empty() {
            return Err(DispatcherError::Configuration(
                "ticket record has no id".to_string(),
            ));
        }

        let priority = priority_score(&ticket.priority);
        let mut tasks: Vec<Task> = Vec::new();

        for rule in &self.rules {
            if !rule.matches(ticket) || tasks.iter().any(|t| t.agent_type == rule.agent_type) {
                continue;
            }

            let dependencies = rule.dependencies(&tasks);

            tasks.push(
                Task::new(&ticket.id, &rule.agent_type, priority)
                    .with_dependencies(dependencies)
                    .with_estimated_duration(rule.estimated_duration_mins),
            );
        }

        if tasks.is_empty() && ticket.ticket_type == self.fallback.ticket_type {
            tasks.push(
                Task::new(&ticket.id, &self.fallback.agent_type, priority)
                    .with_estimated_duration(self.fallback.estimated_duration_mins),
            );
        }

        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ticket(id: &str, ticket_type: &str, tags: &[&str]) -> TicketRecord {
        TicketRecord::new(id, ticket_type).with_tags(tags.iter().copied())
    }

    fn summary(tasks: &[Task]) -> Vec<(String, Vec<String>)> {
        tasks
            .iter()
            .map(|t| (t.agent_type.clone(), t.dependencies.clone()))
            .collect()
    }

    #[test]
    fn test_full_chain() {
        let factory = TaskFactory::default();
        let record = ticket("T-1", "content", &["lesson", "qr", "testing"]).with_priority("high");

        let tasks = factory.derive(&record).unwrap();

        assert_eq!(
            summary(&tasks),
            vec![
                ("content".to_string(), vec![]),
                ("asset".to_string(), vec!["content".to_string()]),
                (
                    "qa".to_string(),
                    vec!["development".to_string(), "asset".to_string()]
                ),
            ]
        );
        assert!(tasks.iter().all(|t| t.priority == 75));
        assert_eq!(tasks[0].estimated_duration_mins, 120);
        assert_eq!(tasks[1].estimated_duration_mins, 60);
        assert_eq!(tasks[2].estimated_duration_mins, 90);
    }

    #[test]
    fn test_qa_only_has_no_dependencies() {
        let factory = TaskFactory::default();
        let tasks = factory
            .derive(&ticket("T-2", "development", &["qa"]))
            .unwrap();

        assert_eq!(summary(&tasks), vec![("qa".to_string(), vec![])]);
    }

    #[test]
    fn test_qa_waits_on_both_prerequisites_when_either_derived() {
        let factory = TaskFactory::default();
        let both = vec!["development".to_string(), "asset".to_string()];

        let tasks = factory
            .derive(&ticket("T-10", "development", &["code", "qa"]))
            .unwrap();
        assert_eq!(summary(&tasks)[1], ("qa".to_string(), both.clone()));

        let tasks = factory
            .derive(&ticket("T-11", "development", &["media", "testing"]))
            .unwrap();
        assert_eq!(summary(&tasks)[1], ("qa".to_string(), both));
    }

    #[test]
    fn test_each_derived_mode_keeps_only_present_prerequisites() {
        let factory = TaskFactory::new(vec![
            TaskRule::new("asset", &["qr"], 60, &[]),
            TaskRule::new("qa", &["qa"], 90, &["development", "asset"]),
        ]);

        let tasks = factory
            .derive(&ticket("T-12", "development", &["qr", "qa"]))
            .unwrap();
        assert_eq!(
            summary(&tasks)[1],
            ("qa".to_string(), vec!["asset".to_string()])
        );
    }

    #[test]
    fn test_every_rule_in_table_order() {
        let factory = TaskFactory::default();
        let record = ticket(
            "T-3",
            "development",
            &["deployment", "validation", "media", "bug", "educational"],
        );

        let tasks = factory.derive(&record).unwrap();

        assert_eq!(
            summary(&tasks),
            vec![
                ("content".to_string(), vec![]),
                ("development".to_string(), vec!["content".to_string()]),
                ("asset".to_string(), vec!["content".to_string()]),
                (
                    "qa".to_string(),
                    vec!["development".to_string(), "asset".to_string()]
                ),
                ("infrastructure".to_string(), vec!["qa".to_string()]),
            ]
        );
    }

    #[test]
    fn test_fallback_only_for_development_tickets() {
        let factory = TaskFactory::default();

        let tasks = factory
            .derive(&ticket("T-4", "development", &["unrelated"]))
            .unwrap();
        assert_eq!(summary(&tasks), vec![("development".to_string(), vec![])]);
        assert_eq!(tasks[0].estimated_duration_mins, 180);

        let tasks = factory
            .derive(&ticket("T-5", "content", &["unrelated"]))
            .unwrap();
        assert!(tasks.is_empty());
    }

    #[test]
    fn test_tag_matching_is_case_sensitive() {
        let factory = TaskFactory::default();
        let tasks = factory
            .derive(&ticket("T-6", "asset", &["QA", "Lesson"]))
            .unwrap();
        assert!(tasks.is_empty());
    }

    #[test]
    fn test_agent_types_unique_per_ticket() {
        let factory = TaskFactory::default();
        let record = ticket(
            "T-7",
            "development",
            &["content", "lesson", "code", "feature", "qr", "images", "qa", "testing"],
        );

        let tasks = factory.derive(&record).unwrap();
        let unique: HashSet<_> = tasks.iter().map(|t| t.agent_type.as_str()).collect();
        assert_eq!(unique.len(), tasks.len());
        assert!(tasks.iter().all(|t| t.ticket_id == "T-7"));
    }

    #[test]
    fn test_unknown_priority_defaults_to_medium() {
        let factory = TaskFactory::default();
        let tasks = factory
            .derive(&ticket("T-8", "content", &["lesson"]).with_priority("whenever"))
            .unwrap();
        assert_eq!(tasks[0].priority, 50);
    }

    #[test]
    fn test_missing_id_is_configuration_error() {
        let factory = TaskFactory::default();
        let result = factory.derive(&ticket("  ", "content", &["lesson"]));
        assert!(matches!(result, Err(DispatcherError::Configuration(_))));
    }

    #[test]
    fn test_agent_types() {
        assert_eq!(
            TaskFactory::default().agent_types(),
            vec!["content", "development", "asset", "qa", "infrastructure"]
        );

        let custom = TaskFactory::new(vec![TaskRule::new("docs", &["docs"], 30, &[])]);
        assert_eq!(custom.agent_types(), vec!["docs", "development"]);
    }

    #[test]
    fn test_derive_is_deterministic() {
        let factory = TaskFactory::default();
        let record = ticket("T-9", "content", &["lesson", "code", "r2"]);
        assert_eq!(factory.derive(&record).unwrap(), factory.derive(&record).unwrap());
    }
}
