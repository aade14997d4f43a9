//! Prometheus metrics for the dispatcher.
//!
//! Counters are updated as tasks move through the queue and the agent pools.
//! Gauges that mirror current state are collected by the server at scrape time.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Queue
// =============================================================================

/// Tasks added to the ready queue, including re-queues after unblocking.
pub static TASKS_QUEUED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("taskrelay_tasks_queued_total", "Total tasks queued"),
        &["agent_type"],
    )
    .unwrap()
});

/// Tasks parked because a dependency had not completed.
pub static TASKS_BLOCKED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "taskrelay_tasks_blocked_total",
            "Total times a task was parked on unmet dependencies",
        ),
        &["agent_type"],
    )
    .unwrap()
});

// =============================================================================
// Execution
// =============================================================================

/// Finished tasks by result.
pub static TASKS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("taskrelay_tasks_finished_total", "Total tasks finished"),
        &["agent_type", "result"], // "completed", "failed"
    )
    .unwrap()
});

/// Task run time in seconds, all attempts included.
pub static TASK_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "taskrelay_task_duration_seconds",
            "Duration of task execution",
        )
        .buckets(vec![1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0]),
        &["agent_type", "result"],
    )
    .unwrap()
});

/// Agent invocations killed by the timeout.
pub static AGENT_TIMEOUTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("taskrelay_agent_timeouts_total", "Total agent timeouts"),
        &["agent_type"],
    )
    .unwrap()
});

/// Agent invocations repeated after a failure.
pub static AGENT_RETRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("taskrelay_agent_retries_total", "Total agent retry attempts"),
        &["agent_type"],
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(TASKS_QUEUED.clone()),
        Box::new(TASKS_BLOCKED.clone()),
        Box::new(TASKS_FINISHED.clone()),
        Box::new(TASK_DURATION.clone()),
        Box::new(AGENT_TIMEOUTS.clone()),
        Box::new(AGENT_RETRIES.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn test_all_metrics_register() {
        let registry = Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }

        TASKS_FINISHED.with_label_values(&["qa", "completed"]).inc();
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "taskrelay_tasks_finished_total"));
    }
}
