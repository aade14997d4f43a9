pub mod agent;
pub mod config;
pub mod dispatcher;
pub mod metrics;
pub mod testing;
pub mod ticket;

pub use agent::{AgentCommand, AgentError, AgentResult, Executor, ProcessExecutor};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
    SanitizedConfig,
};
pub use dispatcher::{
    AgentPool, Dispatcher, DispatcherConfig, DispatcherError, DispatcherEvent, DispatcherStatus,
    PoolStatus, QueueOrder, ReadinessScope, RetryConfig, Task, TaskFactory, TaskKey, TaskStatus,
};
pub use ticket::{
    NewProgressEntry, ProgressEntry, SqliteTicketStore, TicketError, TicketFilter, TicketRecord,
    TicketStore,
};
