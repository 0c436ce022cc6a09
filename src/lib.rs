//! Virtual sensor telemetry agent
//!
//! Simulates an environment sensor and publishes its readings to an MQTT
//! broker on a fixed cadence over a persistent, authenticated session with
//! at-least-once delivery.
//!
//! # Overview
//!
//! The crate is the orchestration layer between a reading source and a
//! connected publish channel:
//! - Simulated sensor readings behind a pluggable source trait
//! - Canonical JSON telemetry messages
//! - MQTT transport with session-loss detection and internal reconnection
//! - A publish scheduler with bounded concurrency and a local failure policy
//! - Lifecycle management: fatal initial connect, graceful shutdown
//!
//! # Quick Start
//!
//! ```rust
//! use sensor_agent::sensor::{ReadingSource, VirtualSensor};
//! use sensor_agent::telemetry::TelemetryMessage;
//!
//! // Deterministic sensor for reproducible output
//! let mut sensor = VirtualSensor::with_seed(1);
//! let reading = sensor.next_reading();
//! assert!((20.0..=80.0).contains(&reading.humidity));
//!
//! // One wire-ready telemetry payload
//! let message = TelemetryMessage::new("living-room-temp-sensor", "living-room", reading);
//! let payload = message.encode().unwrap();
//! assert!(!payload.is_empty());
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod observability;
pub mod sensor;
pub mod telemetry;
pub mod testing;
pub mod transport;

pub use agent::{Agent, LifecycleError, PublishScheduler};
pub use config::AgentConfig;
pub use error::{AgentError, AgentResult};
pub use sensor::{Reading, ReadingSource, VirtualSensor};
pub use telemetry::TelemetryMessage;
pub use transport::{Connection, LifecycleEvent};
