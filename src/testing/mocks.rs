//! Mock connection for exercising the scheduler and lifecycle without a broker
//!
//! State lives behind `Arc`s so tests can keep handles after moving the mock
//! into an agent: clone the fields you want to observe or script before
//! handing the mock over.

use crate::transport::mqtt::{ConnectionState, MqttError};
use crate::transport::{Connection, LifecycleEvent};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// Observable moments in the mock's life, in order of occurrence.
/// Used to assert shutdown ordering (disconnect never before an in-flight
/// publish resolves).
#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    Connected,
    PublishStarted,
    PublishResolved { success: bool },
    Disconnected,
}

/// Scripted in-memory [`Connection`]
pub struct MockConnection {
    /// Successfully published (topic, payload) pairs
    pub published: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    /// Ordered record of connection activity
    pub events: Arc<Mutex<Vec<MockEvent>>>,
    /// Scripted outcomes consumed per publish; empty queue means success
    pub publish_results: Arc<Mutex<VecDeque<Result<(), String>>>>,
    /// Simulated time each publish takes to resolve
    pub publish_latency: Arc<Mutex<Duration>>,
    /// Inject lifecycle events by sending on a clone of this
    pub lifecycle_tx: broadcast::Sender<LifecycleEvent>,
    state: Arc<Mutex<Option<ConnectionState>>>,
    connect_should_fail: bool,
}

impl MockConnection {
    pub fn new() -> Self {
        let (lifecycle_tx, _) = broadcast::channel(16);
        Self {
            published: Arc::new(Mutex::new(Vec::new())),
            events: Arc::new(Mutex::new(Vec::new())),
            publish_results: Arc::new(Mutex::new(VecDeque::new())),
            publish_latency: Arc::new(Mutex::new(Duration::ZERO)),
            lifecycle_tx,
            state: Arc::new(Mutex::new(None)),
            connect_should_fail: false,
        }
    }

    /// Mock whose connect() fails, for the fatal startup path
    pub fn with_connect_failure() -> Self {
        Self {
            connect_should_fail: true,
            ..Self::new()
        }
    }

    /// Queue `count` publish failures ahead of any successes
    pub fn fail_next_publishes(&self, count: usize) {
        let mut results = self.publish_results.lock().unwrap();
        for _ in 0..count {
            results.push_back(Err("simulated publish failure".to_string()));
        }
    }

    pub fn set_publish_latency(&self, latency: Duration) {
        *self.publish_latency.lock().unwrap() = latency;
    }

    pub fn published_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    pub fn event_log(&self) -> Vec<MockEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Highest number of publishes that were ever in flight at once
    pub fn max_in_flight(&self) -> usize {
        let events = self.events.lock().unwrap();
        let mut in_flight = 0usize;
        let mut max = 0usize;
        for event in events.iter() {
            match event {
                MockEvent::PublishStarted => {
                    in_flight += 1;
                    max = max.max(in_flight);
                }
                MockEvent::PublishResolved { .. } => in_flight -= 1,
                _ => {}
            }
        }
        max
    }

    fn record(&self, event: MockEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connection for MockConnection {
    type Error = MqttError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        if self.connect_should_fail {
            *self.state.lock().unwrap() = Some(ConnectionState::Disconnected);
            return Err(MqttError::ConnectionFailed(
                "mock broker refused the connection".to_string(),
            ));
        }
        *self.state.lock().unwrap() = Some(ConnectionState::Connected);
        self.record(MockEvent::Connected);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        *self.state.lock().unwrap() = Some(ConnectionState::Disconnected);
        self.record(MockEvent::Disconnected);
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Self::Error> {
        self.record(MockEvent::PublishStarted);

        let latency = *self.publish_latency.lock().unwrap();
        if latency > Duration::ZERO {
            tokio::time::sleep(latency).await;
        }

        let result = self
            .publish_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()));

        match result {
            Ok(()) => {
                self.published
                    .lock()
                    .unwrap()
                    .push((topic.to_string(), payload));
                self.record(MockEvent::PublishResolved { success: true });
                Ok(())
            }
            Err(reason) => {
                self.record(MockEvent::PublishResolved { success: false });
                Err(MqttError::PublishFailed(reason.into()))
            }
        }
    }

    fn connection_state(&self) -> Option<ConnectionState> {
        self.state.lock().unwrap().clone()
    }

    fn lifecycle_events(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.lifecycle_tx.subscribe()
    }
}
