//! Telemetry reading data type

use serde::{Deserialize, Serialize};

/// One sample of the simulated environment.
///
/// Values are rounded to one decimal place at generation. Humidity stays in
/// [20.0, 80.0] and battery level in [0.0, 100.0], non-increasing over the
/// process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// Temperature in degrees Celsius
    pub temperature: f64,
    /// Relative humidity percentage
    pub humidity: f64,
    /// Remaining battery percentage
    pub battery_level: f64,
}

impl Reading {
    /// Compact one-line summary for publish logs
    pub fn summary(&self) -> String {
        format!(
            "{:.1}C {:.1}%RH battery {:.1}%",
            self.temperature, self.humidity, self.battery_level
        )
    }
}

/// Round to one decimal place, the precision the wire schema carries
pub(crate) fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
