//! Testing utilities and mock implementations.
//!
//! [`MockExecutor`] stands in for the agent processes, so the dispatcher can be
//! driven end to end without spawning anything.
//!
//! # Example
//!
//! ```rust,ignore
//! use taskrelay_core::testing::{fixtures, MockExecutor};
//!
//! let executor = MockExecutor::new();
//! let dispatcher = Dispatcher::new(
//!     DispatcherConfig::default(),
//!     fixtures::default_pool(),
//!     Arc::new(executor.clone()),
//!     Arc::new(SqliteTicketStore::in_memory()?),
//! );
//! ```

mod mock_executor;

pub use mock_executor::{MockExecutor, MockOutcome, RecordedInvocation};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::dispatcher::{default_pool_limits, AgentPool, Task};
    use crate::ticket::TicketRecord;

    /// Create a ticket record with the given tags and default priority.
    pub fn ticket(id: &str, ticket_type: &str, tags: &[&str]) -> TicketRecord {
        TicketRecord::new(id, ticket_type).with_tags(tags.iter().copied())
    }

    /// Create a pending task.
    pub fn task(ticket_id: &str, agent_type: &str, dependencies: &[&str]) -> Task {
        Task::new(ticket_id, agent_type, 50).with_dependencies(dependencies.iter().copied())
    }

    /// Pools for the built-in agent types with their default limits.
    pub fn default_pool() -> AgentPool {
        AgentPool::from_config(&default_pool_limits()).expect("default pool limits are positive")
    }

    /// Pools with explicit limits.
    pub fn pool(limits: &[(&str, usize)]) -> AgentPool {
        AgentPool::new(limits.iter().copied()).expect("pool limits must be positive")
    }
}
