use super::{types::Config, ConfigError};
use crate::dispatcher::TaskFactory;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Every pool limit is positive
/// - Every agent type the task rules can emit has a pool and a command
/// - Agent timeout and retry attempts are positive
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if let Some((agent_type, _)) = config.pools.iter().find(|(_, limit)| **limit == 0) {
        return Err(ConfigError::ValidationError(format!(
            "pools.{} must be greater than 0",
            agent_type
        )));
    }

    for agent_type in TaskFactory::default().agent_types() {
        if !config.pools.contains_key(&agent_type) {
            return Err(ConfigError::ValidationError(format!(
                "pools.{} is missing",
                agent_type
            )));
        }

        match config.agents.get(&agent_type) {
            Some(command) if !command.program.trim().is_empty() => {}
            Some(_) => {
                return Err(ConfigError::ValidationError(format!(
                    "agents.{}.program cannot be empty",
                    agent_type
                )));
            }
            None => {
                return Err(ConfigError::ValidationError(format!(
                    "agents.{} is missing",
                    agent_type
                )));
            }
        }
    }

    // Dispatcher validation
    if config.dispatcher.agent_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "dispatcher.agent_timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.dispatcher.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "dispatcher.retry.max_attempts must be at least 1".to_string(),
        ));
    }

    if config.dispatcher.retry.backoff_multiplier < 1.0 {
        return Err(ConfigError::ValidationError(
            "dispatcher.retry.backoff_multiplier must be at least 1.0".to_string(),
        ));
    }

    Ok(())
}
