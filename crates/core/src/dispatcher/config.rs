//! Dispatcher configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ordering of the ready region of the task queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueOrder {
    /// Arrival order; priority is carried but ignored.
    #[default]
    Fifo,
    /// Higher priority first, arrival order among equals.
    Priority,
}

/// Which completions satisfy a task's dependencies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessScope {
    /// A completed task of the dependency's type on any ticket.
    #[default]
    Global,
    /// A completed task of the dependency's type on the same ticket.
    Ticket,
}

/// Configuration for the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default)]
    pub queue_order: QueueOrder,

    #[serde(default)]
    pub readiness_scope: ReadinessScope,

    /// Upper bound on a single agent invocation (seconds).
    /// A timed out agent is killed and its task fails.
    #[serde(default = "default_agent_timeout")]
    pub agent_timeout_secs: u64,

    /// How often the server logs the status summary (seconds).
    #[serde(default = "default_status_log_interval")]
    pub status_log_interval_secs: u64,

    /// Enqueue stored tickets with status "active" when the server starts.
    #[serde(default = "default_true")]
    pub enqueue_on_startup: bool,

    /// Stop the server once nothing is ready or running.
    #[serde(default)]
    pub exit_when_idle: bool,

    /// Capacity of the event broadcast channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_agent_timeout() -> u64 {
    3600 // 1 hour
}

fn default_status_log_interval() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

fn default_event_buffer() -> usize {
    256
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_order: QueueOrder::default(),
            readiness_scope: ReadinessScope::default(),
            agent_timeout_secs: default_agent_timeout(),
            status_log_interval_secs: default_status_log_interval(),
            enqueue_on_startup: true,
            exit_when_idle: false,
            event_buffer: default_event_buffer(),
            retry: RetryConfig::default(),
        }
    }
}

impl DispatcherConfig {
    pub fn with_queue_order(mut self, order: QueueOrder) -> Self {
        self.queue_order = order;
        self
    }

    pub fn with_readiness_scope(mut self, scope: ReadinessScope) -> Self {
        self.readiness_scope = scope;
        self
    }

    pub fn with_agent_timeout_secs(mut self, secs: u64) -> Self {
        self.agent_timeout_secs = secs;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_timeout_secs)
    }
}

/// Retry policy for failed agent invocations. Defaults to a single attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total invocations per task, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds).
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Upper bound on the delay between retries (milliseconds).
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    1
}

fn default_initial_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    60_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    pub fn with_initial_delay_ms(mut self, ms: u64) -> Self {
        self.initial_delay_ms = ms;
        self
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DispatcherConfig::default();
        assert_eq!(config.queue_order, QueueOrder::Fifo);
        assert_eq!(config.readiness_scope, ReadinessScope::Global);
        assert_eq!(config.agent_timeout_secs, 3600);
        assert_eq!(config.status_log_interval_secs, 5);
        assert!(config.enqueue_on_startup);
        assert!(!config.exit_when_idle);
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[test]
    fn test_deserialize_partial() {
        let toml = r#"
queue_order = "priority"
readiness_scope = "ticket"

[retry]
max_attempts = 3
"#;
        let config: DispatcherConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.queue_order, QueueOrder::Priority);
        assert_eq!(config.readiness_scope, ReadinessScope::Ticket);
        assert_eq!(config.agent_timeout_secs, 3600);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_delay_ms, 1000);
    }

    #[test]
    fn test_unknown_queue_order_rejected() {
        let result: Result<DispatcherConfig, _> = toml::from_str(r#"queue_order = "random""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_retry_backoff() {
        let retry = RetryConfig {
            max_attempts: 5,
            initial_delay_ms: 100,
            max_delay_ms: 350,
            backoff_multiplier: 2.0,
        };
        assert_eq!(retry.delay_after_attempt(1), Duration::from_millis(100));
        assert_eq!(retry.delay_after_attempt(2), Duration::from_millis(200));
        assert_eq!(retry.delay_after_attempt(3), Duration::from_millis(350));
        assert_eq!(retry.delay_after_attempt(10), Duration::from_millis(350));
    }
}
