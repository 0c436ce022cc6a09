//! Shared helpers for integration tests

use sensor_agent::config::{AgentConfig, DeviceSection, MqttSection, TelemetrySection};

/// Baseline configuration used across the integration tests:
/// 5 s period, 10 s publish timeout, 1 s retry delay.
pub fn test_config() -> AgentConfig {
    AgentConfig {
        device: DeviceSection {
            id: "test-sensor".to_string(),
            location: "test-lab".to_string(),
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
            topic: "test/telemetry".to_string(),
            publish_period_secs: 5,
            publish_timeout_secs: 10,
            retry_delay_secs: 1,
        },
    }
}
