//! Wire-format telemetry messages

pub mod message;

pub use message::{EncodingError, TelemetryMessage};
