//! Ready/blocked task queue.

use std::collections::VecDeque;

use super::config::QueueOrder;
use super::readiness::ReadinessTracker;
use super::task::{Task, TaskKey, TaskStatus};

/// Tasks waiting to run.
///
/// The ready region is consumed by the coordinator in order. The blocked region
/// holds tasks parked until a completion makes them ready again; it is rescanned
/// in the order the tasks were parked.
#[derive(Debug, Default)]
pub struct TaskQueue {
    order: QueueOrder,
    ready: VecDeque<Task>,
    blocked: Vec<Task>,
}

/// Outcome of a single coordinator pass over the ready region.
#[derive(Debug, Default)]
pub struct Selection {
    /// The task to run next, if any was startable.
    pub task: Option<Task>,
    /// Tasks found not ready and moved to the blocked region.
    pub parked: Vec<Task>,
}

impl TaskQueue {
    pub fn new(order: QueueOrder) -> Self {
        Self {
            order,
            ..Default::default()
        }
    }

    /// Add a task to the ready region.
    pub fn enqueue(&mut self, mut task: Task) {
        task.status = TaskStatus::Pending;
        match self.order {
            QueueOrder::Fifo => self.ready.push_back(task),
            QueueOrder::Priority => {
                let position = self
                    .ready
                    .iter()
                    .position(|queued| queued.priority < task.priority)
                    .unwrap_or(self.ready.len());
                self.ready.insert(position, task);
            }
        }
    }

    /// Pop the head of the ready region.
    pub fn dequeue(&mut self) -> Option<Task> {
        self.ready.pop_front()
    }

    /// Remove the earliest ready task matching the predicate.
    pub fn dequeue_first<F>(&mut self, mut predicate: F) -> Option<Task>
    where
        F: FnMut(&Task) -> bool,
    {
        let position = self.ready.iter().position(|task| predicate(task))?;
        self.ready.remove(position)
    }

    /// Mark a task blocked and hold it until a rescan finds it ready.
    pub fn park(&mut self, mut task: Task) {
        task.status = TaskStatus::Blocked;
        self.blocked.push(task);
    }

    /// Walk the ready region in order. Tasks that are not ready are parked; the
    /// first ready task accepted by `can_start` is removed and returned. Tasks
    /// after it are left untouched.
    pub fn select<F>(&mut self, tracker: &ReadinessTracker, mut can_start: F) -> Selection
    where
        F: FnMut(&Task) -> bool,
    {
        let mut selection = Selection::default();
        let mut index = 0;

        while index < self.ready.len() {
            if !tracker.is_ready(&self.ready[index]) {
                if let Some(mut task) = self.ready.remove(index) {
                    task.status = TaskStatus::Blocked;
                    selection.parked.push(task.clone());
                    self.blocked.push(task);
                }
                continue;
            }

            if can_start(&self.ready[index]) {
                selection.task = self.ready.remove(index);
                break;
            }

            index += 1;
        }

        selection
    }

    /// Move every blocked task that is now ready back through `enqueue`.
    /// Returns the keys of the moved tasks in parking order.
    pub fn rescan_blocked(&mut self, tracker: &ReadinessTracker) -> Vec<TaskKey> {
        let (now_ready, still_blocked): (Vec<Task>, Vec<Task>) = std::mem::take(&mut self.blocked)
            .into_iter()
            .partition(|task| tracker.is_ready(task));

        self.blocked = still_blocked;

        let keys = now_ready.iter().map(Task::key).collect();
        for task in now_ready {
            self.enqueue(task);
        }
        keys
    }

    /// Whether a task with this identity is ready or blocked.
    pub fn contains(&self, key: &TaskKey) -> bool {
        self.ready
            .iter()
            .chain(self.blocked.iter())
            .any(|task| task.ticket_id == key.ticket_id && task.agent_type == key.agent_type)
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn blocked_len(&self) -> usize {
        self.blocked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }

    pub fn ready_tasks(&self) -> impl Iterator<Item = &Task> {
        self.ready.iter()
    }

    pub fn blocked_tasks(&self) -> &[Task] {
        &self.blocked
    }
}
