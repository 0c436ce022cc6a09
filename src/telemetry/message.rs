//! Telemetry message construction and encoding
//!
//! The wire schema is a flat JSON object:
//! `deviceId`, `timestamp`, `temperature`, `humidity`, `batteryLevel`,
//! `location`. The timestamp is RFC 3339 UTC with a trailing `Z`, captured
//! when the message is built for a send attempt rather than when the tick
//! was scheduled.

use crate::sensor::Reading;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Encoding failures are programming defects, not runtime conditions;
/// callers must not retry them.
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("Failed to serialize telemetry message: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One telemetry sample ready for publishing. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryMessage {
    pub device_id: String,
    pub timestamp: String,
    #[serde(flatten)]
    pub reading: Reading,
    pub location: String,
}

impl TelemetryMessage {
    /// Build a message around `reading`, stamping it with the current UTC time.
    pub fn new(device_id: &str, location: &str, reading: Reading) -> Self {
        Self {
            device_id: device_id.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            reading,
            location: location.to_string(),
        }
    }

    /// Serialize to the canonical JSON payload.
    pub fn encode(&self) -> Result<Vec<u8>, EncodingError> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_reading() -> Reading {
        Reading {
            temperature: 23.4,
            humidity: 51.2,
            battery_level: 97.6,
        }
    }

    #[test]
    fn test_timestamp_ends_with_z() {
        let message = TelemetryMessage::new("sensor-1", "living-room", sample_reading());
        assert!(message.timestamp.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&message.timestamp).is_ok());
    }

    #[test]
    fn test_encode_produces_flat_schema() {
        let message = TelemetryMessage::new("sensor-1", "living-room", sample_reading());
        let payload = message.encode().expect("encode");
        let json: serde_json::Value = serde_json::from_slice(&payload).expect("parse");

        assert_eq!(json["deviceId"], "sensor-1");
        assert_eq!(json["location"], "living-room");
        assert_eq!(json["temperature"], 23.4);
        assert_eq!(json["humidity"], 51.2);
        assert_eq!(json["batteryLevel"], 97.6);
        assert!(json["timestamp"].is_string());
        // No nested reading object on the wire
        assert!(json.get("reading").is_none());
    }

    #[test]
    fn test_round_trip() {
        let message = TelemetryMessage::new("sensor-1", "living-room", sample_reading());
        let payload = message.encode().expect("encode");
        let decoded: TelemetryMessage = serde_json::from_slice(&payload).expect("decode");
        assert_eq!(decoded, message);
    }
}
