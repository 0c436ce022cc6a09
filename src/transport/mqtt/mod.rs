//! MQTT implementation of the connection abstraction
//!
//! `connection` holds the pure state and configuration logic,
//! `client` holds the impure rumqttc I/O.

pub mod client;
pub mod connection;

pub use client::MqttConnection;
pub use connection::{configure_mqtt_options, ConnectionState, MqttError, ReconnectPolicy};
