//! rumqttc-backed connection with an event-loop supervisor task
//!
//! The supervisor owns the rumqttc event loop: it polls for broker events,
//! tracks session state through a watch channel, broadcasts lifecycle
//! notifications (interrupted/resumed), and retries lost sessions with a
//! backoff schedule. The rest of the agent only sees the [`Connection`]
//! contract.

use super::connection::{configure_mqtt_options, ConnectionState, MqttError, ReconnectPolicy};
use crate::config::MqttSection;
use crate::transport::{Connection, LifecycleEvent};
use async_trait::async_trait;
use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::{mqttbytes::QoS, AsyncClient, Event, EventLoop};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Capacity for the lifecycle event channel; observers that lag simply
/// miss old notifications, which is acceptable for log-only consumers.
const LIFECYCLE_CHANNEL_CAPACITY: usize = 16;

/// How long disconnect() waits for the supervisor task to stop
const SUPERVISOR_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// MQTT session handle implementing [`Connection`]
pub struct MqttConnection {
    device_id: String,
    config: MqttSection,
    connect_timeout: Duration,
    client: AsyncClient,
    event_loop: Option<tokio::sync::Mutex<EventLoop>>,
    event_loop_handle: Option<JoinHandle<()>>,
    state_tx: Option<watch::Sender<ConnectionState>>,
    state_rx: Option<watch::Receiver<ConnectionState>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    lifecycle_tx: broadcast::Sender<LifecycleEvent>,
    reconnect: ReconnectPolicy,
}

impl MqttConnection {
    pub fn new(device_id: &str, config: MqttSection) -> Result<Self, MqttError> {
        let (client, event_loop) = Self::create_session(device_id, &config)?;
        let (lifecycle_tx, _) = broadcast::channel(LIFECYCLE_CHANNEL_CAPACITY);
        let connect_timeout = Duration::from_secs(config.connect_timeout_secs);

        Ok(MqttConnection {
            device_id: device_id.to_string(),
            config,
            connect_timeout,
            client,
            event_loop: Some(tokio::sync::Mutex::new(event_loop)),
            event_loop_handle: None,
            state_tx: None,
            state_rx: None,
            shutdown_tx: None,
            lifecycle_tx,
            reconnect: ReconnectPolicy::default(),
        })
    }

    /// Create a fresh client/event-loop pair. Used at construction and when
    /// reconnecting after a clean disconnect.
    fn create_session(
        device_id: &str,
        config: &MqttSection,
    ) -> Result<(AsyncClient, EventLoop), MqttError> {
        let mqtt_options = configure_mqtt_options(device_id, config)?;
        Ok(AsyncClient::new(mqtt_options, 10))
    }

    /// Block until the broker confirms the session or the attempt is known
    /// to have failed, bounded by the connect timeout.
    async fn wait_for_connection_confirmation(
        mut state_rx: watch::Receiver<ConnectionState>,
        mut failure_rx: oneshot::Receiver<String>,
        timeout: Duration,
    ) -> Result<(), MqttError> {
        let wait = async {
            loop {
                let state = state_rx.borrow().clone();
                match state {
                    ConnectionState::Connected => return Ok(()),
                    ConnectionState::Disconnected => {
                        let reason = failure_rx
                            .try_recv()
                            .unwrap_or_else(|_| "connection attempt failed".to_string());
                        return Err(MqttError::ConnectionFailed(reason));
                    }
                    ConnectionState::Connecting | ConnectionState::Interrupted(_) => {}
                }
                if state_rx.changed().await.is_err() {
                    return Err(MqttError::ConnectionFailed(
                        "connection state channel closed".to_string(),
                    ));
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(MqttError::ConnectTimeout(timeout)),
        }
    }

    /// State guard shared by publish paths
    fn check_connection_state(&self) -> Result<(), MqttError> {
        let state_rx = self.state_rx.as_ref().ok_or(MqttError::NotConnected {
            state: ConnectionState::Disconnected,
        })?;

        let current_state = state_rx.borrow().clone();
        if !current_state.can_publish() {
            return Err(MqttError::NotConnected {
                state: current_state,
            });
        }

        Ok(())
    }

    /// Establish the session: spawn the supervisor, then wait for CONNACK.
    ///
    /// A failure before the first CONNACK stops the supervisor and surfaces
    /// here; once a session has been confirmed, later losses are handled
    /// internally and reported as lifecycle events instead.
    pub async fn connect(&mut self) -> Result<(), MqttError> {
        if self.event_loop_handle.is_some() {
            return Err(MqttError::ConnectionFailed(
                "connection already started".to_string(),
            ));
        }

        // Rebuild the client after a previous clean disconnect
        if self.event_loop.is_none() {
            let (client, event_loop) = Self::create_session(&self.device_id, &self.config)?;
            self.client = client;
            self.event_loop = Some(tokio::sync::Mutex::new(event_loop));
        }
        let mut event_loop = self
            .event_loop
            .take()
            .ok_or_else(|| {
                MqttError::ConnectionFailed("event loop already started".to_string())
            })?
            .into_inner();

        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let (failure_tx, failure_rx) = oneshot::channel::<String>();
        self.state_rx = Some(state_rx.clone());
        self.state_tx = Some(state_tx.clone());
        self.shutdown_tx = Some(shutdown_tx);

        let device_id = self.device_id.clone();
        let lifecycle_tx = self.lifecycle_tx.clone();
        let reconnect = self.reconnect.clone();

        let handle = tokio::spawn(async move {
            info!(device_id = %device_id, "Starting MQTT event loop");
            let mut failure_tx = Some(failure_tx);
            let mut ever_connected = false;
            let mut interrupt_attempts = 0u32;

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            debug!("Shutdown signal received, stopping MQTT event loop");
                            break;
                        }
                    }

                    event = event_loop.poll() => match event {
                        Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                            if ever_connected {
                                info!(
                                    session_present = ack.session_present,
                                    "Connection resumed"
                                );
                                let _ = lifecycle_tx.send(LifecycleEvent::Resumed);
                            } else {
                                info!(
                                    session_present = ack.session_present,
                                    "Connection established"
                                );
                            }
                            ever_connected = true;
                            interrupt_attempts = 0;
                            let _ = state_tx.send(ConnectionState::Connected);
                        }
                        Ok(Event::Incoming(Packet::Disconnect(_))) => {
                            // Broker-initiated teardown counts as an interruption;
                            // the next poll starts the internal retry.
                            interrupt_attempts += 1;
                            if interrupt_attempts == 1 {
                                warn!("Connection interrupted: broker closed the session");
                                let _ = lifecycle_tx.send(LifecycleEvent::Interrupted {
                                    reason: "broker closed the session".to_string(),
                                });
                            }
                            let _ = state_tx.send(ConnectionState::Interrupted(interrupt_attempts));
                        }
                        Ok(event) => {
                            debug!(?event, "MQTT event");
                        }
                        Err(e) => {
                            let reason = e.to_string();
                            if !ever_connected {
                                error!(error = %reason, "Initial connection failed");
                                if let Some(tx) = failure_tx.take() {
                                    let _ = tx.send(reason);
                                }
                                let _ = state_tx.send(ConnectionState::Disconnected);
                                break;
                            }

                            interrupt_attempts += 1;
                            if interrupt_attempts == 1 {
                                warn!(error = %reason, "Connection interrupted");
                                let _ = lifecycle_tx.send(LifecycleEvent::Interrupted { reason });
                            } else {
                                debug!(
                                    attempt = interrupt_attempts,
                                    error = %reason,
                                    "Reconnect attempt failed"
                                );
                            }
                            let _ = state_tx.send(ConnectionState::Interrupted(interrupt_attempts));

                            let delay = reconnect.delay_for_attempt(interrupt_attempts);
                            tokio::select! {
                                _ = tokio::time::sleep(delay) => {}
                                _ = shutdown_rx.changed() => {
                                    if *shutdown_rx.borrow() {
                                        break;
                                    }
                                }
                            }
                        }
                    }
                }
            }
            debug!(device_id = %device_id, "MQTT event loop stopped");
        });
        self.event_loop_handle = Some(handle);

        Self::wait_for_connection_confirmation(state_rx, failure_rx, self.connect_timeout).await
    }

    /// Publish one message at QoS 1. Fails fast when the session is down;
    /// a reading that cannot be published is dropped by the caller, not
    /// queued here.
    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), MqttError> {
        self.check_connection_state()?;

        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| MqttError::PublishFailed(Box::new(e)))
    }

    /// Graceful teardown: request DISCONNECT, stop the supervisor, wait for
    /// it (bounded), and leave the handle reusable for a later connect().
    pub async fn disconnect(&mut self) -> Result<(), MqttError> {
        let disconnect_result = self.client.disconnect().await;

        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(true);
        }

        if let Some(state_tx) = &self.state_tx {
            let _ = state_tx.send(ConnectionState::Disconnected);
        }

        if let Some(handle) = self.event_loop_handle.take() {
            match tokio::time::timeout(SUPERVISOR_STOP_TIMEOUT, handle).await {
                Ok(Ok(())) => debug!("Event loop task stopped cleanly"),
                Ok(Err(e)) if !e.is_cancelled() => {
                    warn!(error = %e, "Event loop task ended with error");
                }
                Err(_) => warn!("Event loop task did not stop in time, dropping it"),
                _ => {}
            }
        }
        self.state_tx = None;

        info!("MQTT connection closed");
        disconnect_result.map_err(|e| MqttError::DisconnectFailed(Box::new(e)))
    }

    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.state_rx.as_ref().map(|rx| rx.borrow().clone())
    }

    pub fn lifecycle_events(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.lifecycle_tx.subscribe()
    }
}

#[async_trait]
impl Connection for MqttConnection {
    type Error = MqttError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        MqttConnection::connect(self).await
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        MqttConnection::disconnect(self).await
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Self::Error> {
        MqttConnection::publish(self, topic, payload).await
    }

    fn connection_state(&self) -> Option<ConnectionState> {
        MqttConnection::connection_state(self)
    }

    fn lifecycle_events(&self) -> broadcast::Receiver<LifecycleEvent> {
        MqttConnection::lifecycle_events(self)
    }
}
