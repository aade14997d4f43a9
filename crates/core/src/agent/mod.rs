//! External agent invocation.
//!
//! An agent is a worker process for one agent type. It receives the ticket id as
//! its last argument and prints a JSON result object on stdout.

mod config;
mod error;
mod process;
mod traits;
mod types;

pub use config::{default_agent_commands, AgentCommand};
pub use error::AgentError;
pub use process::ProcessExecutor;
pub use traits::Executor;
pub use types::{AgentResult, STATUS_COMPLETED, STATUS_FAILED};
