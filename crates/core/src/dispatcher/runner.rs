//! Dispatcher implementation.

use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::config::DispatcherConfig;
use super::factory::TaskFactory;
use super::pool::{AgentPermit, AgentPool};
use super::queue::TaskQueue;
use super::readiness::ReadinessTracker;
use super::task::{Task, TaskKey, TaskStatus};
use super::types::{DispatcherError, DispatcherEvent, DispatcherStatus};
use crate::agent::{AgentError, AgentResult, Executor, STATUS_COMPLETED};
use crate::metrics;
use crate::ticket::{
    NewProgressEntry, TicketError, TicketFilter, TicketRecord, TicketStore, STATUS_ACTIVE,
    STATUS_IN_PROGRESS,
};

/// Everything the coordinator and the executions mutate. One lock guards it all.
struct DispatchState {
    queue: TaskQueue,
    readiness: ReadinessTracker,
    active: HashMap<TaskKey, Task>,
    completed: Vec<Task>,
    failed: Vec<Task>,
    /// Executions spawned and not yet through their final bookkeeping.
    in_flight: usize,
}

impl DispatchState {
    fn is_live(&self, key: &TaskKey) -> bool {
        self.active.contains_key(key) || self.queue.contains(key)
    }

    fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.in_flight == 0
    }
}

struct Shared {
    config: DispatcherConfig,
    factory: TaskFactory,
    pool: AgentPool,
    executor: Arc<dyn Executor>,
    ticket_store: Arc<dyn TicketStore>,
    state: Mutex<DispatchState>,
    running: AtomicBool,
    /// Wakes the coordinator on enqueue and on every completion.
    wakeup: Notify,
    /// Signals `wait_idle` callers to re-check.
    idle: Notify,
    events: broadcast::Sender<DispatcherEvent>,
}

/// Routes ticket tasks to agents.
///
/// A single coordinator task drains the ready queue. Each dispatched task runs
/// in its own tokio task while holding a permit from its agent type's pool.
pub struct Dispatcher {
    shared: Arc<Shared>,
    shutdown_tx: broadcast::Sender<()>,
    coordinator: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Create a dispatcher with the built-in task rules.
    pub fn new(
        config: DispatcherConfig,
        pool: AgentPool,
        executor: Arc<dyn Executor>,
        ticket_store: Arc<dyn TicketStore>,
    ) -> Self {
        Self::with_factory(config, TaskFactory::default(), pool, executor, ticket_store)
    }

    /// Create a dispatcher with a custom task factory.
    pub fn with_factory(
        config: DispatcherConfig,
        factory: TaskFactory,
        pool: AgentPool,
        executor: Arc<dyn Executor>,
        ticket_store: Arc<dyn TicketStore>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (events, _) = broadcast::channel(config.event_buffer.max(1));

        let state = DispatchState {
            queue: TaskQueue::new(config.queue_order),
            readiness: ReadinessTracker::new(config.readiness_scope),
            active: HashMap::new(),
            completed: Vec::new(),
            failed: Vec::new(),
            in_flight: 0,
        };

        Self {
            shared: Arc::new(Shared {
                config,
                factory,
                pool,
                executor,
                ticket_store,
                state: Mutex::new(state),
                running: AtomicBool::new(false),
                wakeup: Notify::new(),
                idle: Notify::new(),
                events,
            }),
            shutdown_tx,
            coordinator: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.shared.config
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Start the coordinator loop.
    pub async fn start(&self) -> Result<(), DispatcherError> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            warn!("Dispatcher already running");
            return Err(DispatcherError::AlreadyRunning);
        }

        info!(
            executor = self.shared.executor.name(),
            queue_order = ?self.shared.config.queue_order,
            readiness_scope = ?self.shared.config.readiness_scope,
            "Starting dispatcher"
        );

        let shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(Arc::clone(&self.shared).run_coordinator(shutdown_rx));
        *self.coordinator.lock().await = Some(handle);

        Ok(())
    }

    /// Stop dispatching and wait for every in-flight agent to finish.
    ///
    /// Tasks that have not started stay queued.
    pub async fn stop(&self) -> Result<(), DispatcherError> {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            warn!("Dispatcher not running");
            return Err(DispatcherError::NotRunning);
        }

        info!("Stopping dispatcher");

        // Signal shutdown to the coordinator
        let _ = self.shutdown_tx.send(());

        if let Some(handle) = self.coordinator.lock().await.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Dispatch loop ended abnormally");
            }
        }

        info!("Dispatcher stopped");
        Ok(())
    }

    /// Derive the tasks of a ticket and queue them.
    ///
    /// Nothing is queued if any task has no agent pool or would duplicate a live task.
    pub async fn submit(&self, ticket: &TicketRecord) -> Result<Vec<TaskKey>, DispatcherError> {
        let tasks = self.shared.factory.derive(ticket)?;
        self.enqueue_ticket(ticket, tasks, &[]).await
    }

    /// Submit a stored ticket, skipping agent types its progress log shows completed.
    ///
    /// The skipped completions are recorded as satisfied dependencies, so the
    /// remaining tasks do not wait for work that already happened.
    pub async fn resume(&self, ticket: &TicketRecord) -> Result<Vec<TaskKey>, DispatcherError> {
        let done: Vec<String> = self
            .shared
            .ticket_store
            .progress(&ticket.id)?
            .into_iter()
            .filter(|entry| entry.status == STATUS_COMPLETED)
            .map(|entry| entry.agent_type)
            .collect();

        let tasks = self
            .shared
            .factory
            .derive(ticket)?
            .into_iter()
            .filter(|t| !done.contains(&t.agent_type))
            .collect();

        self.enqueue_ticket(ticket, tasks, &done).await
    }

    async fn enqueue_ticket(
        &self,
        ticket: &TicketRecord,
        tasks: Vec<Task>,
        restored: &[String],
    ) -> Result<Vec<TaskKey>, DispatcherError> {
        if let Some(task) = tasks
            .iter()
            .find(|t| !self.shared.pool.contains(&t.agent_type))
        {
            return Err(DispatcherError::Configuration(format!(
                "no agent pool configured for agent type '{}'",
                task.agent_type
            )));
        }

        let keys: Vec<TaskKey> = tasks.iter().map(Task::key).collect();

        {
            let mut state = self.shared.state.lock().await;

            if let Some(key) = keys.iter().find(|key| state.is_live(key)) {
                return Err(DispatcherError::DuplicateTask {
                    ticket_id: key.ticket_id.clone(),
                    agent_type: key.agent_type.clone(),
                });
            }

            for agent_type in restored {
                state.readiness.record_completion(&ticket.id, agent_type);
            }

            for task in tasks {
                debug!(task = %task.key(), dependencies = ?task.dependencies, "Task queued");
                metrics::TASKS_QUEUED
                    .with_label_values(&[&task.agent_type])
                    .inc();
                self.shared
                    .emit(DispatcherEvent::TaskQueued { key: task.key() });
                state.queue.enqueue(task);
            }
        }

        if keys.is_empty() && !restored.is_empty() {
            info!(ticket_id = %ticket.id, "Every task of ticket already completed");
        } else if keys.is_empty() {
            warn!(ticket_id = %ticket.id, tags = ?ticket.tags, "No tasks derived for ticket");
        } else {
            info!(ticket_id = %ticket.id, tasks = keys.len(), "Ticket submitted");
            self.shared.wakeup.notify_one();
        }

        Ok(keys)
    }

    /// Load a ticket from the store and submit it.
    pub async fn submit_by_id(&self, ticket_id: &str) -> Result<Vec<TaskKey>, DispatcherError> {
        let ticket = self.shared.ticket_store.load(ticket_id)?;
        self.submit(&ticket).await
    }

    /// Resume every stored ticket that is still "active" or "in_progress".
    ///
    /// The matching tickets are collected before any is submitted, since a
    /// started ticket changes status. Tickets that cannot be submitted are
    /// logged and skipped. Returns the number of tasks queued.
    pub async fn submit_active_tickets(&self) -> Result<usize, DispatcherError> {
        let tickets = self.stored_unfinished_tickets()?;
        let mut queued = 0;

        for ticket in &tickets {
            match self.resume(ticket).await {
                Ok(keys) => queued += keys.len(),
                Err(e) => warn!(ticket_id = %ticket.id, error = %e, "Skipping stored ticket"),
            }
        }

        info!(
            tickets = tickets.len(),
            tasks = queued,
            "Queued stored unfinished tickets"
        );
        Ok(queued)
    }

    fn stored_unfinished_tickets(&self) -> Result<Vec<TicketRecord>, DispatcherError> {
        const PAGE: i64 = 100;
        let mut seen = HashSet::new();
        let mut tickets = Vec::new();

        // A ticket leaving "active" mid-scan shows up under "in_progress".
        for status in [STATUS_ACTIVE, STATUS_IN_PROGRESS] {
            let mut offset = 0;
            loop {
                let filter = TicketFilter::new()
                    .with_status(status)
                    .with_limit(PAGE)
                    .with_offset(offset);
                let page = self.shared.ticket_store.list(&filter)?;
                let page_len = page.len() as i64;

                for ticket in page {
                    if seen.insert(ticket.id.clone()) {
                        tickets.push(ticket);
                    }
                }

                if page_len < PAGE {
                    break;
                }
                offset += PAGE;
            }
        }

        Ok(tickets)
    }

    /// Get current dispatcher status.
    pub async fn status(&self) -> DispatcherStatus {
        let state = self.shared.state.lock().await;

        DispatcherStatus {
            running: self.is_running(),
            active: state.active.len(),
            blocked: state.queue.blocked_len(),
            completed: state.completed.len(),
            failed: state.failed.len(),
            queue_size: state.queue.ready_len(),
            pools: self.shared.pool.status(),
        }
    }

    /// Latest view of a task, live or finished.
    pub async fn task(&self, ticket_id: &str, agent_type: &str) -> Option<Task> {
        let key = TaskKey::new(ticket_id, agent_type);
        let state = self.shared.state.lock().await;

        if let Some(task) = state.active.get(&key) {
            return Some(task.clone());
        }

        let queued = state
            .queue
            .ready_tasks()
            .chain(state.queue.blocked_tasks().iter())
            .find(|t| t.key() == key);
        if let Some(task) = queued {
            return Some(task.clone());
        }

        state
            .completed
            .iter()
            .chain(state.failed.iter())
            .filter(|t| t.key() == key)
            .max_by_key(|t| t.completion_time)
            .cloned()
    }

    /// Every task of a ticket: finished first, then running, ready and blocked.
    pub async fn tasks_for_ticket(&self, ticket_id: &str) -> Vec<Task> {
        let state = self.shared.state.lock().await;

        let mut finished: Vec<Task> = state
            .completed
            .iter()
            .chain(state.failed.iter())
            .filter(|t| t.ticket_id == ticket_id)
            .cloned()
            .collect();
        finished.sort_by_key(|t| t.completion_time);

        let mut running: Vec<Task> = state
            .active
            .values()
            .filter(|t| t.ticket_id == ticket_id)
            .cloned()
            .collect();
        running.sort_by_key(|t| t.start_time);

        finished
            .into_iter()
            .chain(running)
            .chain(
                state
                    .queue
                    .ready_tasks()
                    .chain(state.queue.blocked_tasks().iter())
                    .filter(|t| t.ticket_id == ticket_id)
                    .cloned(),
            )
            .collect()
    }

    pub async fn completed_tasks(&self) -> Vec<Task> {
        self.shared.state.lock().await.completed.clone()
    }

    pub async fn failed_tasks(&self) -> Vec<Task> {
        self.shared.state.lock().await.failed.clone()
    }

    pub async fn blocked_tasks(&self) -> Vec<Task> {
        self.shared.state.lock().await.queue.blocked_tasks().to_vec()
    }

    pub async fn active_tasks(&self) -> Vec<Task> {
        self.shared
            .state
            .lock()
            .await
            .active
            .values()
            .cloned()
            .collect()
    }

    /// Subscribe to task lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<DispatcherEvent> {
        self.shared.events.subscribe()
    }

    /// Wait until no task is ready or in flight. Blocked tasks may remain.
    ///
    /// Only resolves while the dispatcher is running if work is queued.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.shared.state.lock().await.is_idle() {
                return;
            }

            notified.await;
        }
    }
}

impl Shared {
    fn emit(&self, event: DispatcherEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn run_coordinator(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Dispatch loop started");
        let mut executions = JoinSet::new();

        while self.running.load(Ordering::SeqCst) {
            while let Some(joined) = executions.try_join_next() {
                log_join_error(joined);
            }

            if let Some((task, permit)) = self.next_dispatch().await {
                executions.spawn(Arc::clone(&self).execute(task, permit));
                continue;
            }

            self.idle.notify_waiters();

            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = self.wakeup.notified() => {}
                Some(joined) = executions.join_next(), if !executions.is_empty() => {
                    log_join_error(joined);
                }
            }
        }

        if !executions.is_empty() {
            info!(
                in_flight = executions.len(),
                "Waiting for in-flight agents to finish"
            );
        }
        while let Some(joined) = executions.join_next().await {
            log_join_error(joined);
        }

        self.idle.notify_waiters();
        info!("Dispatch loop stopped");
    }

    /// Take the earliest ready task whose pool has a free permit, parking every
    /// task found not ready on the way.
    async fn next_dispatch(&self) -> Option<(Task, AgentPermit)> {
        let mut state = self.state.lock().await;
        let DispatchState {
            queue, readiness, ..
        } = &mut *state;

        let mut permit = None;
        let selection = queue.select(readiness, |task| {
            match self.pool.try_acquire(&task.agent_type) {
                Ok(Some(acquired)) => {
                    permit = Some(acquired);
                    true
                }
                _ => false,
            }
        });

        for task in &selection.parked {
            let waiting_on = readiness.missing_dependencies(task);
            debug!(task = %task.key(), waiting_on = ?waiting_on, "Task blocked on dependencies");
            metrics::TASKS_BLOCKED
                .with_label_values(&[&task.agent_type])
                .inc();
            self.emit(DispatcherEvent::TaskBlocked {
                key: task.key(),
                waiting_on,
            });
        }

        let (mut task, permit) = match (selection.task, permit) {
            (Some(task), Some(permit)) => (task, permit),
            _ => return None,
        };

        task.status = TaskStatus::InProgress;
        task.start_time = Some(Utc::now());
        task.assigned_agent = Some(format!("{}:{}", self.executor.name(), task.agent_type));

        state.active.insert(task.key(), task.clone());
        state.in_flight += 1;

        info!(task = %task.key(), priority = task.priority, "Dispatching task");
        self.emit(DispatcherEvent::TaskStarted { key: task.key() });

        Some((task, permit))
    }

    async fn execute(self: Arc<Self>, mut task: Task, permit: AgentPermit) {
        let outcome = AssertUnwindSafe(async {
            self.mark_ticket_started(&task.ticket_id);
            self.run_attempts(&mut task).await
        })
        .catch_unwind()
        .await;

        let result = match outcome {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(task = %task.key(), panic = %message, "Agent execution panicked");
                AgentResult::from_panic(&task.agent_type, &message)
            }
        };

        self.finish(task, permit, result).await;
    }

    /// The first started task of an active ticket moves the ticket to in_progress.
    fn mark_ticket_started(&self, ticket_id: &str) {
        match self.ticket_store.get(ticket_id) {
            Ok(Some(record)) if record.status == STATUS_ACTIVE => {
                if let Err(e) = self.ticket_store.update_status(ticket_id, STATUS_IN_PROGRESS) {
                    warn!(ticket_id, error = %e, "Failed to mark ticket in progress");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(ticket_id, error = %e, "Failed to load ticket"),
        }
    }

    async fn run_attempts(&self, task: &mut Task) -> AgentResult {
        let retry = &self.config.retry;

        loop {
            task.attempts += 1;
            debug!(task = %task.key(), attempt = task.attempts, "Invoking agent");

            let result = self.run_once(task).await;
            if result.is_success() || task.attempts >= retry.max_attempts {
                return result;
            }

            let delay = retry.delay_after_attempt(task.attempts);
            warn!(
                task = %task.key(),
                attempt = task.attempts,
                max_attempts = retry.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Agent failed, retrying"
            );
            metrics::AGENT_RETRIES
                .with_label_values(&[&task.agent_type])
                .inc();
            tokio::time::sleep(delay).await;
        }
    }

    async fn run_once(&self, task: &Task) -> AgentResult {
        let timeout_secs = self.config.agent_timeout_secs;

        match tokio::time::timeout(self.config.agent_timeout(), self.executor.run(task)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(task = %task.key(), timeout_secs, "Agent timed out");
                metrics::AGENT_TIMEOUTS
                    .with_label_values(&[&task.agent_type])
                    .inc();
                AgentResult::from_error(&task.agent_type, &AgentError::Timeout { timeout_secs })
            }
        }
    }

    async fn finish(&self, mut task: Task, permit: AgentPermit, result: AgentResult) {
        let succeeded = result.is_success();
        task.status = if succeeded {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
        task.completion_time = Some(Utc::now());

        self.pool.release(permit);
        self.pool.record_outcome(&task.agent_type, succeeded);

        metrics::TASKS_FINISHED
            .with_label_values(&[&task.agent_type, task.status.as_str()])
            .inc();
        if let Some(duration) = task.duration() {
            metrics::TASK_DURATION
                .with_label_values(&[&task.agent_type, task.status.as_str()])
                .observe(duration.num_milliseconds() as f64 / 1000.0);
        }

        {
            let mut state = self.state.lock().await;
            state.active.remove(&task.key());
            if succeeded {
                state.readiness.record_completed(&task);
                state.completed.push(task.clone());
            } else {
                state.failed.push(task.clone());
            }
        }

        self.record_progress(&task, &result);

        if succeeded {
            info!(task = %task.key(), attempts = task.attempts, "Task completed");
            self.emit(DispatcherEvent::TaskCompleted { task });
        } else {
            error!(
                task = %task.key(),
                attempts = task.attempts,
                status = %result.status,
                output = %result.output,
                "Task failed"
            );
            self.emit(DispatcherEvent::TaskFailed { task });
        }

        {
            let mut state = self.state.lock().await;
            let DispatchState {
                queue, readiness, ..
            } = &mut *state;

            for key in queue.rescan_blocked(readiness) {
                debug!(task = %key, "Task unblocked");
                metrics::TASKS_QUEUED
                    .with_label_values(&[&key.agent_type])
                    .inc();
                self.emit(DispatcherEvent::TaskUnblocked { key });
            }

            state.in_flight = state.in_flight.saturating_sub(1);
        }

        self.wakeup.notify_one();
        self.idle.notify_waiters();
    }

    fn record_progress(&self, task: &Task, result: &AgentResult) {
        let entry = NewProgressEntry {
            ticket_id: task.ticket_id.clone(),
            agent_type: task.agent_type.clone(),
            status: result.status.clone(),
            result: result.output.clone(),
        };

        match self.ticket_store.append_progress(entry) {
            Ok(_) => {}
            Err(TicketError::NotFound(ticket_id)) => {
                warn!(
                    ticket_id = %ticket_id,
                    agent_type = %task.agent_type,
                    "Ticket not in store, progress not recorded"
                );
            }
            Err(e) => {
                warn!(task = %task.key(), error = %e, "Failed to record progress");
            }
        }
    }
}

fn log_join_error(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "Task execution aborted");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockExecutor};
    use crate::ticket::SqliteTicketStore;
    use std::time::Duration;

    fn dispatcher(executor: MockExecutor) -> Dispatcher {
        Dispatcher::new(
            DispatcherConfig::default(),
            fixtures::default_pool(),
            Arc::new(executor),
            Arc::new(SqliteTicketStore::in_memory().unwrap()),
        )
    }

    #[tokio::test]
    async fn test_start_stop() {
        let dispatcher = dispatcher(MockExecutor::new());

        assert!(!dispatcher.is_running());
        assert!(matches!(
            dispatcher.stop().await,
            Err(DispatcherError::NotRunning)
        ));

        dispatcher.start().await.unwrap();
        assert!(dispatcher.is_running());
        assert!(matches!(
            dispatcher.start().await,
            Err(DispatcherError::AlreadyRunning)
        ));

        dispatcher.stop().await.unwrap();
        assert!(!dispatcher.is_running());
        assert!(!dispatcher.status().await.running);
    }

    #[tokio::test]
    async fn test_submit_queues_without_running() {
        let dispatcher = dispatcher(MockExecutor::new());
        let keys = dispatcher
            .submit(&fixtures::ticket("T-1", "content", &["lesson", "qr"]))
            .await
            .unwrap();

        assert_eq!(
            keys,
            vec![TaskKey::new("T-1", "content"), TaskKey::new("T-1", "asset")]
        );
        let status = dispatcher.status().await;
        assert_eq!(status.queue_size, 2);
        assert_eq!(status.active, 0);
        assert_eq!(
            dispatcher.task("T-1", "asset").await.unwrap().status,
            TaskStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_duplicate_live_task_rejected() {
        let dispatcher = dispatcher(MockExecutor::new());
        let ticket = fixtures::ticket("T-1", "development", &["qa"]);

        dispatcher.submit(&ticket).await.unwrap();
        let result = dispatcher.submit(&ticket).await;

        assert!(matches!(
            result,
            Err(DispatcherError::DuplicateTask { ref agent_type, .. }) if agent_type == "qa"
        ));
        assert_eq!(dispatcher.status().await.queue_size, 1);
    }

    #[tokio::test]
    async fn test_missing_pool_rejects_whole_ticket() {
        let dispatcher = Dispatcher::new(
            DispatcherConfig::default(),
            AgentPool::new([("content", 1)]).unwrap(),
            Arc::new(MockExecutor::new()),
            Arc::new(SqliteTicketStore::in_memory().unwrap()),
        );

        let result = dispatcher
            .submit(&fixtures::ticket("T-1", "content", &["lesson", "qa"]))
            .await;

        assert!(matches!(result, Err(DispatcherError::Configuration(_))));
        assert_eq!(dispatcher.status().await.queue_size, 0);
    }

    #[tokio::test]
    async fn test_submit_by_id_missing_ticket() {
        let dispatcher = dispatcher(MockExecutor::new());
        let result = dispatcher.submit_by_id("ghost").await;
        assert!(matches!(
            result,
            Err(DispatcherError::TicketStore(TicketError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_resubmit_after_completion() {
        let executor = MockExecutor::new();
        let dispatcher = dispatcher(executor.clone());
        let ticket = fixtures::ticket("T-1", "development", &["qa"]);

        dispatcher.start().await.unwrap();
        dispatcher.submit(&ticket).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), dispatcher.wait_idle())
            .await
            .unwrap();

        // The first task is terminal, so the identity is free again.
        dispatcher.submit(&ticket).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), dispatcher.wait_idle())
            .await
            .unwrap();
        dispatcher.stop().await.unwrap();

        assert_eq!(dispatcher.completed_tasks().await.len(), 2);
        assert_eq!(executor.invocation_count().await, 2);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
