//! Ticket dispatcher.
//!
//! Tickets are turned into tasks, one per agent type, by the [`TaskFactory`].
//! The [`Dispatcher`] queues them and runs each through its agent once:
//! - **Readiness**: a task waits until every agent type it depends on has completed work
//! - **Concurrency**: each agent type has its own pool limit ([`AgentPool`])
//! - **Results**: the agent's result decides the task status and is appended to the
//!   ticket's progress log

mod config;
mod factory;
mod pool;
mod queue;
mod readiness;
mod runner;
mod task;
mod types;

pub use config::{DispatcherConfig, QueueOrder, ReadinessScope, RetryConfig};
pub use factory::{default_rules, FallbackRule, PrerequisiteMode, TaskFactory, TaskRule};
pub use pool::{default_pool_limits, AgentPermit, AgentPool};
pub use queue::{Selection, TaskQueue};
pub use readiness::ReadinessTracker;
pub use runner::Dispatcher;
pub use task::{priority_score, Task, TaskKey, TaskStatus, DEFAULT_PRIORITY_SCORE, PRIORITY_SCORES};
pub use types::{DispatcherError, DispatcherEvent, DispatcherStatus, PoolStatus};
