use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::agent::{default_agent_commands, AgentCommand};
use crate::dispatcher::{default_pool_limits, DispatcherConfig};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Working directory of every agent process.
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    /// Concurrency limit per agent type.
    #[serde(default = "default_pool_limits")]
    pub pools: BTreeMap<String, usize>,
    /// Command per agent type.
    #[serde(default = "default_agent_commands")]
    pub agents: BTreeMap<String, AgentCommand>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_root: default_project_root(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            dispatcher: DispatcherConfig::default(),
            pools: default_pool_limits(),
            agents: default_agent_commands(),
        }
    }
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("taskrelay.db")
}

/// Sanitized config for API responses (agent environment values redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub project_root: PathBuf,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub dispatcher: DispatcherConfig,
    pub pools: BTreeMap<String, usize>,
    pub agents: BTreeMap<String, SanitizedAgentCommand>,
}

/// Agent command with only the names of its environment variables.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAgentCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env_keys: Vec<String>,
}

impl From<&AgentCommand> for SanitizedAgentCommand {
    fn from(command: &AgentCommand) -> Self {
        Self {
            program: command.program.clone(),
            args: command.args.clone(),
            env_keys: command.env.keys().cloned().collect(),
        }
    }
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            project_root: config.project_root.clone(),
            server: config.server.clone(),
            database: config.database.clone(),
            dispatcher: config.dispatcher.clone(),
            pools: config.pools.clone(),
            agents: config
                .agents
                .iter()
                .map(|(agent_type, command)| (agent_type.clone(), command.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{QueueOrder, ReadinessScope};

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config.project_root, PathBuf::from("."));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.path, PathBuf::from("taskrelay.db"));
        assert_eq!(config.pools.get("qa"), Some(&4));
        assert_eq!(config.pools.get("development"), Some(&3));
        assert_eq!(config.agents.len(), 5);
        assert_eq!(config.dispatcher.queue_order, QueueOrder::Fifo);
    }

    #[test]
    fn test_full_config() {
        let toml = r#"
project_root = "/srv/course"

[server]
host = "127.0.0.1"
port = 9000

[database]
path = "/var/lib/taskrelay/tickets.db"

[dispatcher]
queue_order = "priority"
readiness_scope = "ticket"
agent_timeout_secs = 600
exit_when_idle = true

[dispatcher.retry]
max_attempts = 3
initial_delay_ms = 250

[pools]
content = 1
qa = 8

[agents.content]
program = "python3"
args = ["agents/content.py"]

[agents.qa]
program = "./bin/qa"

[agents.qa.env]
QA_TOKEN = "secret"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.project_root, PathBuf::from("/srv/course"));
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.dispatcher.queue_order, QueueOrder::Priority);
        assert_eq!(config.dispatcher.readiness_scope, ReadinessScope::Ticket);
        assert_eq!(config.dispatcher.agent_timeout_secs, 600);
        assert!(config.dispatcher.exit_when_idle);
        assert_eq!(config.dispatcher.retry.max_attempts, 3);
        assert_eq!(config.dispatcher.retry.initial_delay_ms, 250);
        // An explicit table replaces the defaults.
        assert_eq!(config.pools.len(), 2);
        assert_eq!(config.agents.len(), 2);
        assert!(config.agents["qa"].args.is_empty());
    }

    #[test]
    fn test_sanitized_config_hides_env_values() {
        let mut config = Config::default();
        config.agents.insert(
            "qa".to_string(),
            AgentCommand::new("./bin/qa").with_env("QA_TOKEN", "secret"),
        );

        let sanitized = SanitizedConfig::from(&config);
        let json = serde_json::to_string(&sanitized).unwrap();

        assert!(json.contains("QA_TOKEN"));
        assert!(!json.contains("secret"));
        assert_eq!(sanitized.agents["qa"].env_keys, vec!["QA_TOKEN"]);
    }
}
