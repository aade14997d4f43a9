//! Mock executor for testing.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::agent::{AgentError, AgentResult, Executor};
use crate::dispatcher::{Task, TaskKey};

/// What the mock does when invoked.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Return a completed result.
    Complete,
    /// Return a failed result with this error message.
    Fail(String),
    /// Panic with this message.
    Panic(String),
    /// Return this result as is.
    Respond(AgentResult),
}

/// A recorded invocation for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedInvocation {
    pub ticket_id: String,
    pub agent_type: String,
    /// Attempt number of the task at invocation time.
    pub attempt: u32,
    pub started_at: Instant,
}

#[derive(Debug, Default)]
struct Concurrency {
    running: HashMap<String, usize>,
    high_water: HashMap<String, usize>,
}

/// Decrements the running count when the invocation ends, however it ends.
struct RunningGuard {
    concurrency: Arc<Mutex<Concurrency>>,
    agent_type: String,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let mut concurrency = lock(&self.concurrency);
        if let Some(count) = concurrency.running.get_mut(&self.agent_type) {
            *count = count.saturating_sub(1);
        }
    }
}

fn lock(concurrency: &Mutex<Concurrency>) -> MutexGuard<'_, Concurrency> {
    concurrency
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock implementation of the Executor trait.
///
/// Provides controllable behavior for testing:
/// - Scripted outcomes per agent type or per task
/// - Failing the first N attempts of a task
/// - Simulated run time per agent type
/// - Concurrency high-water marks per agent type
///
/// # Example
///
/// ```rust,ignore
/// use taskrelay_core::testing::{MockExecutor, MockOutcome};
///
/// let executor = MockExecutor::new();
/// executor.set_agent_outcome("asset", MockOutcome::Fail("no images".into())).await;
/// executor.set_delay("qa", Duration::from_millis(50)).await;
///
/// // Run the dispatcher...
///
/// assert_eq!(executor.max_concurrent("qa"), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MockExecutor {
    invocations: Arc<RwLock<Vec<RecordedInvocation>>>,
    agent_outcomes: Arc<RwLock<HashMap<String, MockOutcome>>>,
    task_outcomes: Arc<RwLock<HashMap<TaskKey, MockOutcome>>>,
    failing_attempts: Arc<RwLock<HashMap<TaskKey, u32>>>,
    delays: Arc<RwLock<HashMap<String, Duration>>>,
    default_delay: Arc<RwLock<Duration>>,
    concurrency: Arc<Mutex<Concurrency>>,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExecutor {
    /// Create a new mock executor that completes every task after 10ms.
    pub fn new() -> Self {
        Self {
            invocations: Arc::new(RwLock::new(Vec::new())),
            agent_outcomes: Arc::new(RwLock::new(HashMap::new())),
            task_outcomes: Arc::new(RwLock::new(HashMap::new())),
            failing_attempts: Arc::new(RwLock::new(HashMap::new())),
            delays: Arc::new(RwLock::new(HashMap::new())),
            default_delay: Arc::new(RwLock::new(Duration::from_millis(10))),
            concurrency: Arc::new(Mutex::new(Concurrency::default())),
        }
    }

    /// Set the outcome for every task of an agent type.
    pub async fn set_agent_outcome(&self, agent_type: &str, outcome: MockOutcome) {
        self.agent_outcomes
            .write()
            .await
            .insert(agent_type.to_string(), outcome);
    }

    /// Set the outcome for one task. Takes precedence over the agent type outcome.
    pub async fn set_task_outcome(&self, ticket_id: &str, agent_type: &str, outcome: MockOutcome) {
        self.task_outcomes
            .write()
            .await
            .insert(TaskKey::new(ticket_id, agent_type), outcome);
    }

    /// Fail the next `attempts` invocations of a task, then fall through to its
    /// configured outcome.
    pub async fn fail_attempts(&self, ticket_id: &str, agent_type: &str, attempts: u32) {
        self.failing_attempts
            .write()
            .await
            .insert(TaskKey::new(ticket_id, agent_type), attempts);
    }

    /// Set the simulated run time of an agent type.
    pub async fn set_delay(&self, agent_type: &str, delay: Duration) {
        self.delays
            .write()
            .await
            .insert(agent_type.to_string(), delay);
    }

    /// Set the simulated run time of agent types without their own delay.
    pub async fn set_default_delay(&self, delay: Duration) {
        *self.default_delay.write().await = delay;
    }

    /// Get all recorded invocations, in start order.
    pub async fn recorded_invocations(&self) -> Vec<RecordedInvocation> {
        self.invocations.read().await.clone()
    }

    /// Get the number of invocations performed.
    pub async fn invocation_count(&self) -> usize {
        self.invocations.read().await.len()
    }

    /// Ticket ids invoked for an agent type, in start order.
    pub async fn invoked_tickets(&self, agent_type: &str) -> Vec<String> {
        self.invocations
            .read()
            .await
            .iter()
            .filter(|i| i.agent_type == agent_type)
            .map(|i| i.ticket_id.clone())
            .collect()
    }

    /// Highest number of simultaneous invocations seen for an agent type.
    pub fn max_concurrent(&self, agent_type: &str) -> usize {
        lock(&self.concurrency)
            .high_water
            .get(agent_type)
            .copied()
            .unwrap_or(0)
    }

    /// Invocations of an agent type running right now.
    pub fn running(&self, agent_type: &str) -> usize {
        lock(&self.concurrency)
            .running
            .get(agent_type)
            .copied()
            .unwrap_or(0)
    }

    fn enter(&self, agent_type: &str) -> RunningGuard {
        let mut concurrency = lock(&self.concurrency);
        let running = {
            let count = concurrency
                .running
                .entry(agent_type.to_string())
                .or_insert(0);
            *count += 1;
            *count
        };
        let high_water = concurrency
            .high_water
            .entry(agent_type.to_string())
            .or_insert(0);
        *high_water = (*high_water).max(running);

        RunningGuard {
            concurrency: Arc::clone(&self.concurrency),
            agent_type: agent_type.to_string(),
        }
    }

    async fn outcome_for(&self, key: &TaskKey) -> MockOutcome {
        {
            let mut failing = self.failing_attempts.write().await;
            if let Some(remaining) = failing.get_mut(key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return MockOutcome::Fail(format!("scripted failure for {}", key));
                }
            }
        }

        if let Some(outcome) = self.task_outcomes.read().await.get(key) {
            return outcome.clone();
        }

        self.agent_outcomes
            .read()
            .await
            .get(&key.agent_type)
            .cloned()
            .unwrap_or(MockOutcome::Complete)
    }
}

#[async_trait]
impl Executor for MockExecutor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(&self, task: &Task) -> AgentResult {
        let key = task.key();
        self.invocations.write().await.push(RecordedInvocation {
            ticket_id: task.ticket_id.clone(),
            agent_type: task.agent_type.clone(),
            attempt: task.attempts,
            started_at: Instant::now(),
        });

        let _guard = self.enter(&task.agent_type);

        let delay = match self.delays.read().await.get(&task.agent_type) {
            Some(delay) => *delay,
            None => *self.default_delay.read().await,
        };
        tokio::time::sleep(delay).await;

        match self.outcome_for(&key).await {
            MockOutcome::Complete => AgentResult::completed(
                &task.agent_type,
                json!({ "summary": format!("{} finished {}", task.agent_type, task.ticket_id) }),
            ),
            MockOutcome::Fail(message) => {
                AgentResult::failed(&task.agent_type, json!({ "error": message }))
            }
            MockOutcome::Panic(message) => panic!("{}", message),
            MockOutcome::Respond(result) => result,
        }
    }

    async fn validate(&self) -> Result<(), AgentError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_completes_and_records() {
        let executor = MockExecutor::new();
        let result = executor.run(&Task::new("T-1", "qa", 50)).await;

        assert!(result.is_success());
        assert_eq!(executor.invocation_count().await, 1);
        assert_eq!(executor.invoked_tickets("qa").await, vec!["T-1"]);
        assert_eq!(executor.max_concurrent("qa"), 1);
        assert_eq!(executor.running("qa"), 0);
    }

    #[tokio::test]
    async fn test_task_outcome_overrides_agent_outcome() {
        let executor = MockExecutor::new();
        executor
            .set_agent_outcome("qa", MockOutcome::Fail("nope".to_string()))
            .await;
        executor
            .set_task_outcome("T-2", "qa", MockOutcome::Complete)
            .await;

        assert!(!executor.run(&Task::new("T-1", "qa", 50)).await.is_success());
        assert!(executor.run(&Task::new("T-2", "qa", 50)).await.is_success());
    }

    #[tokio::test]
    async fn test_fail_attempts_then_complete() {
        let executor = MockExecutor::new();
        executor.fail_attempts("T-1", "qa", 2).await;
        let task = Task::new("T-1", "qa", 50);

        assert!(!executor.run(&task).await.is_success());
        assert!(!executor.run(&task).await.is_success());
        assert!(executor.run(&task).await.is_success());
    }

    #[tokio::test]
    async fn test_concurrency_high_water() {
        let executor = MockExecutor::new();
        executor.set_delay("asset", Duration::from_millis(50)).await;

        let a = Task::new("T-1", "asset", 50);
        let b = Task::new("T-2", "asset", 50);
        tokio::join!(executor.run(&a), executor.run(&b));

        assert_eq!(executor.max_concurrent("asset"), 2);
        assert_eq!(executor.running("asset"), 0);
    }

    #[tokio::test]
    async fn test_dropped_invocation_releases_running_count() {
        let executor = MockExecutor::new();
        executor.set_delay("qa", Duration::from_secs(10)).await;

        let task = Task::new("T-1", "qa", 50);
        let result =
            tokio::time::timeout(Duration::from_millis(20), executor.run(&task)).await;

        assert!(result.is_err());
        assert_eq!(executor.running("qa"), 0);
    }
}
