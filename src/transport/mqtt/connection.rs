//! Pure connection state and configuration logic for the MQTT transport

use crate::config::MqttSection;
use rumqttc::v5::MqttOptions;
use rumqttc::Transport as RumqttcTransport;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Session state as observed by the rest of the agent.
///
/// Written only by the connection's event-loop task; everyone else takes
/// snapshot reads through a watch channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// No session; the state before connect() and after disconnect()
    Disconnected,
    /// connect() issued, waiting for broker confirmation
    Connecting,
    /// Session established and usable
    Connected,
    /// Session lost unexpectedly; internal retry in progress (attempt count)
    Interrupted(u32),
}

impl ConnectionState {
    /// Publishing is only meaningful with a confirmed session
    pub fn can_publish(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("No connection confirmation within {0:?}")]
    ConnectTimeout(Duration),
    #[error("Publishing failed")]
    PublishFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Disconnect failed")]
    DisconnectFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Not connected - current state: {state:?}")]
    NotConnected { state: ConnectionState },
}

/// Delay schedule for the internal reconnection loop.
///
/// A short ramp, then a sustained delay for as long as the interruption
/// lasts. Retries are unlimited; recovery is reported through lifecycle
/// events rather than bubbling out of the transport.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delays in milliseconds for the first attempts
    pub backoff_pattern: Vec<u64>,
    /// Delay used once the pattern is exhausted
    pub sustained_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            backoff_pattern: vec![500, 1000, 2000, 5000],
            sustained_delay_ms: 5000,
        }
    }
}

impl ReconnectPolicy {
    /// Backoff delay for a given attempt (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let index = (attempt.saturating_sub(1)) as usize;
        let millis = self
            .backoff_pattern
            .get(index)
            .copied()
            .unwrap_or(self.sustained_delay_ms);
        Duration::from_millis(millis)
    }
}

/// Build rumqttc options from the MQTT config section.
///
/// The device id is used verbatim as the MQTT client id: the broker keys
/// persistent session state on it, so it must be stable across restarts.
pub fn configure_mqtt_options(
    device_id: &str,
    config: &MqttSection,
) -> Result<MqttOptions, MqttError> {
    let url = Url::parse(&config.broker_url)
        .map_err(|_| MqttError::InvalidBrokerUrl(config.broker_url.clone()))?;

    let host = url
        .host_str()
        .ok_or_else(|| MqttError::InvalidBrokerUrl(config.broker_url.clone()))?;
    let port = url
        .port()
        .unwrap_or(if url.scheme() == "mqtts" { 8883 } else { 1883 });

    let mut mqtt_options = MqttOptions::new(device_id, host, port);

    if url.scheme() == "mqtts" {
        let transport = RumqttcTransport::tls_with_default_config();
        mqtt_options.set_transport(transport);
    }

    if let Some(username_env) = &config.username_env {
        if let Ok(username) = std::env::var(username_env) {
            let password = config
                .password_env
                .as_ref()
                .and_then(|env_name| std::env::var(env_name).ok())
                .unwrap_or_default();
            mqtt_options.set_credentials(&username, &password);
        }
    }

    mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    mqtt_options.set_clean_start(config.clean_session);

    Ok(mqtt_options)
}
