//! Top-level error type for agent operations
//!
//! Publish and encoding failures never reach this level: the scheduler
//! converts them to log events and keeps ticking. What remains is the
//! startup/shutdown surface that `main` has to report.

use thiserror::Error;

/// Errors that can escape the agent to the process boundary
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] crate::transport::mqtt::MqttError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] crate::agent::LifecycleError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    #[test]
    fn test_config_error_converts() {
        let error: AgentError = ConfigError::InvalidConfig("bad".to_string()).into();
        assert!(matches!(error, AgentError::Config(_)));
        assert!(error.to_string().contains("bad"));
    }

    #[test]
    fn test_transport_error_converts() {
        let error: AgentError =
            crate::transport::mqtt::MqttError::InvalidBrokerUrl("nope".to_string()).into();
        assert!(matches!(error, AgentError::Transport(_)));
    }
}
