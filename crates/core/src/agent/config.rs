//! Agent command configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Command line used to invoke one agent type.
///
/// The ticket id is appended after `args` as the final positional argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables for the process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl AgentCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Commands for the built-in agent types, relative to the project root.
pub fn default_agent_commands() -> BTreeMap<String, AgentCommand> {
    [
        ("content", "agents/content-parser/content_agent.py"),
        ("development", "agents/development/development_agent.py"),
        ("asset", "agents/asset-generator/asset_agent.py"),
        ("qa", "agents/qa/qa_agent.py"),
        ("infrastructure", "agents/infrastructure/infrastructure_agent.py"),
    ]
    .into_iter()
    .map(|(agent_type, script)| {
        (
            agent_type.to_string(),
            AgentCommand::new("python3").with_args([script]),
        )
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_command() {
        let toml = r#"
program = "node"
args = ["agents/qa/index.js", "--strict"]

[env]
QA_LEVEL = "full"
"#;
        let command: AgentCommand = toml::from_str(toml).unwrap();
        assert_eq!(command.program, "node");
        assert_eq!(command.args, vec!["agents/qa/index.js", "--strict"]);
        assert_eq!(command.env.get("QA_LEVEL").map(String::as_str), Some("full"));
    }

    #[test]
    fn test_default_commands_cover_builtin_types() {
        let commands = default_agent_commands();
        for agent_type in ["content", "development", "asset", "qa", "infrastructure"] {
            let command = commands.get(agent_type).unwrap();
            assert_eq!(command.program, "python3");
            assert_eq!(command.args.len(), 1);
        }
    }
}
