//! Wire-format tests for telemetry messages

use chrono::{DateTime, Utc};
use sensor_agent::sensor::Reading;
use sensor_agent::telemetry::TelemetryMessage;

fn sample_reading() -> Reading {
    Reading {
        temperature: 21.7,
        humidity: 48.3,
        battery_level: 92.4,
    }
}

#[test]
fn test_round_trip_is_field_for_field_equal() {
    let message = TelemetryMessage::new("test-sensor", "test-lab", sample_reading());
    let payload = message.encode().expect("encode should succeed");

    let decoded: TelemetryMessage = serde_json::from_slice(&payload).expect("decode");
    assert_eq!(decoded, message);
    assert_eq!(decoded.device_id, "test-sensor");
    assert_eq!(decoded.location, "test-lab");
    assert_eq!(decoded.reading, sample_reading());
}

#[test]
fn test_timestamp_is_utc_with_z_suffix() {
    let message = TelemetryMessage::new("test-sensor", "test-lab", sample_reading());

    assert!(message.timestamp.ends_with('Z'));

    let parsed: DateTime<Utc> = message
        .timestamp
        .parse()
        .expect("timestamp should parse as UTC");
    let age = Utc::now().signed_duration_since(parsed);
    assert!(age.num_seconds().abs() < 5, "timestamp should be recent");
}

#[test]
fn test_wire_schema_has_exactly_the_expected_fields() {
    let message = TelemetryMessage::new("test-sensor", "test-lab", sample_reading());
    let payload = message.encode().expect("encode");
    let json: serde_json::Value = serde_json::from_slice(&payload).expect("parse");

    let object = json.as_object().expect("payload is a JSON object");
    let mut keys: Vec<&str> = object.keys().map(|k| k.as_str()).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        vec![
            "batteryLevel",
            "deviceId",
            "humidity",
            "location",
            "temperature",
            "timestamp",
        ]
    );
}

#[test]
fn test_numeric_fields_survive_encoding_exactly() {
    let message = TelemetryMessage::new("test-sensor", "test-lab", sample_reading());
    let payload = message.encode().expect("encode");
    let json: serde_json::Value = serde_json::from_slice(&payload).expect("parse");

    assert_eq!(json["temperature"].as_f64(), Some(21.7));
    assert_eq!(json["humidity"].as_f64(), Some(48.3));
    assert_eq!(json["batteryLevel"].as_f64(), Some(92.4));
}
