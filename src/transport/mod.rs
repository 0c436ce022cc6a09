//! Broker connection abstraction
//!
//! The agent core talks to the broker through the [`Connection`] trait so
//! the publish loop and lifecycle can be tested against mocks. The one real
//! implementation is [`mqtt::MqttConnection`].

use tokio::sync::broadcast;

pub mod mqtt;

/// Asynchronous session notifications, delivered independently of any
/// in-flight publish. A session can be lost with no publish in flight, so
/// these travel on their own channel rather than as publish error returns.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// The established session was lost unexpectedly
    Interrupted { reason: String },
    /// Internal reconnection brought the session back
    Resumed,
}

/// Capability set of a broker session.
///
/// `connect` blocks until the session is confirmed or known to have failed
/// and is idempotent after a clean disconnect. `publish` is one logical
/// at-least-once attempt. `disconnect` must be called on every exit path.
#[async_trait::async_trait]
pub trait Connection: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Establish the session; returns once confirmed or failed
    async fn connect(&mut self) -> Result<(), Self::Error>;

    /// Graceful teardown, releases the session slot on the broker
    async fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Deliver one message with at-least-once guarantee
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Self::Error>;

    /// Snapshot of the current session state; None before the first connect
    fn connection_state(&self) -> Option<mqtt::ConnectionState>;

    /// Subscribe to interruption/resumption notifications
    fn lifecycle_events(&self) -> broadcast::Receiver<LifecycleEvent>;
}

/// Type alias for the production transport
pub type MqttTransport = mqtt::MqttConnection;
