//! Configuration for the telemetry agent
//!
//! All runtime parameters (broker endpoint, credentials, topic, cadence)
//! live in a single immutable [`AgentConfig`] built once at startup and
//! passed into the agent. Credentials are never stored in the file itself;
//! the config names environment variables that hold them.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Top-level agent configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub device: DeviceSection,
    pub mqtt: MqttSection,
    pub telemetry: TelemetrySection,
}

/// Identity of the simulated device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// Device identifier, doubles as the MQTT client id (must match [a-zA-Z0-9._-]+)
    pub id: String,
    /// Human-readable placement, included in every telemetry message
    pub location: String,
}

/// Broker session parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Broker URL with scheme and optional port (mqtt:// or mqtts://)
    pub broker_url: String,
    /// Environment variable containing the username
    pub username_env: Option<String>,
    /// Environment variable containing the password
    pub password_env: Option<String>,
    /// Keep-alive interval in seconds (default: 30)
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// Request a clean session instead of resuming broker-side state (default: false)
    #[serde(default)]
    pub clean_session: bool,
    /// How long to wait for connection confirmation (default: 30)
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

/// Publish cadence and failure policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySection {
    /// Topic telemetry messages are published to
    pub topic: String,
    /// Seconds between publish attempts (default: 5)
    #[serde(default = "default_publish_period_secs")]
    pub publish_period_secs: u64,
    /// Seconds before an unresponsive publish is treated as failed (default: 10)
    #[serde(default = "default_publish_timeout_secs")]
    pub publish_timeout_secs: u64,
    /// Seconds to pause after a failed publish, must be shorter than the period (default: 1)
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_publish_period_secs() -> u64 {
    5
}

fn default_publish_timeout_secs() -> u64 {
    10
}

fn default_retry_delay_secs() -> u64 {
    1
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid device ID format: {0}")]
    InvalidDeviceId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AgentConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AgentConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field values that serde cannot check on its own.
    ///
    /// Invalid values here are deployment defects, rejected before the agent
    /// ever touches the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_device_id(&self.device.id)?;

        if self.device.location.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "device.location must not be empty".to_string(),
            ));
        }

        if self.telemetry.topic.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "telemetry.topic must not be empty".to_string(),
            ));
        }

        if self.telemetry.publish_period_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "telemetry.publish_period_secs must be greater than zero".to_string(),
            ));
        }

        if self.telemetry.retry_delay_secs >= self.telemetry.publish_period_secs {
            return Err(ConfigError::InvalidConfig(format!(
                "telemetry.retry_delay_secs ({}) must be shorter than publish_period_secs ({})",
                self.telemetry.retry_delay_secs, self.telemetry.publish_period_secs
            )));
        }

        if self.mqtt.keep_alive_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "mqtt.keep_alive_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Get MQTT username from the configured environment variable
    pub fn mqtt_username(&self) -> Option<String> {
        self.mqtt
            .username_env
            .as_ref()
            .and_then(|name| std::env::var(name).ok())
    }

    /// Get MQTT password from the configured environment variable
    pub fn mqtt_password(&self) -> Option<String> {
        self.mqtt
            .password_env
            .as_ref()
            .and_then(|name| std::env::var(name).ok())
    }

    pub fn publish_period(&self) -> Duration {
        Duration::from_secs(self.telemetry.publish_period_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.telemetry.publish_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.telemetry.retry_delay_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.mqtt.connect_timeout_secs)
    }
}

fn validate_device_id(device_id: &str) -> Result<(), ConfigError> {
    let valid_chars = device_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if device_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidDeviceId(format!(
            "Device ID '{device_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AgentConfig {
        AgentConfig {
            device: DeviceSection {
                id: "living-room-temp-sensor".to_string(),
                location: "living-room".to_string(),
            },
            mqtt: MqttSection {
                broker_url: "mqtt://localhost:1883".to_string(),
                username_env: None,
                password_env: None,
                keep_alive_secs: 30,
                clean_session: false,
                connect_timeout_secs: 30,
            },
            telemetry: TelemetrySection {
                topic: "home/living-room/temperature/telemetry".to_string(),
                publish_period_secs: 5,
                publish_timeout_secs: 10,
                retry_delay_secs: 1,
            },
        }
    }

    #[test]
    fn test_valid_config_passes_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_device_id_charset() {
        assert!(validate_device_id("sensor-01.home_a").is_ok());
        assert!(validate_device_id("").is_err());
        assert!(validate_device_id("bad id").is_err());
        assert!(validate_device_id("bad/id").is_err());
    }

    #[test]
    fn test_zero_period_rejected() {
        let mut config = valid_config();
        config.telemetry.publish_period_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_retry_delay_must_be_shorter_than_period() {
        let mut config = valid_config();
        config.telemetry.retry_delay_secs = 5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_empty_topic_rejected() {
        let mut config = valid_config();
        config.telemetry.topic = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_defaults_applied_when_fields_omitted() {
        let toml_str = r#"
            [device]
            id = "sensor-1"
            location = "lab"

            [mqtt]
            broker_url = "mqtt://localhost:1883"

            [telemetry]
            topic = "lab/telemetry"
        "#;

        let config: AgentConfig = toml::from_str(toml_str).expect("should parse");
        assert_eq!(config.mqtt.keep_alive_secs, 30);
        assert!(!config.mqtt.clean_session);
        assert_eq!(config.telemetry.publish_period_secs, 5);
        assert_eq!(config.telemetry.publish_timeout_secs, 10);
        assert_eq!(config.telemetry.retry_delay_secs, 1);
    }

    #[test]
    fn test_credentials_resolved_from_environment() {
        let mut config = valid_config();
        config.mqtt.username_env = Some("SENSOR_AGENT_TEST_USER".to_string());
        config.mqtt.password_env = Some("SENSOR_AGENT_TEST_PASS".to_string());

        std::env::set_var("SENSOR_AGENT_TEST_USER", "alice");
        std::env::set_var("SENSOR_AGENT_TEST_PASS", "secret");

        assert_eq!(config.mqtt_username().as_deref(), Some("alice"));
        assert_eq!(config.mqtt_password().as_deref(), Some("secret"));
    }

    #[test]
    fn test_credentials_absent_when_env_not_configured() {
        let config = valid_config();
        assert_eq!(config.mqtt_username(), None);
        assert_eq!(config.mqtt_password(), None);
    }

    #[test]
    fn test_duration_accessors() {
        let config = valid_config();
        assert_eq!(config.publish_period(), Duration::from_secs(5));
        assert_eq!(config.publish_timeout(), Duration::from_secs(10));
        assert_eq!(config.retry_delay(), Duration::from_secs(1));
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
    }
}
