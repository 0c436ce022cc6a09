//! Virtual sensor producing simulated readings

use super::reading::{round_one_decimal, Reading};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Source of telemetry samples.
///
/// Implementations perform no I/O and never fail; the publish loop calls
/// [`next_reading`](ReadingSource::next_reading) once per attempt it makes.
pub trait ReadingSource: Send {
    fn next_reading(&mut self) -> Reading;
}

const BASE_TEMPERATURE: f64 = 22.0;
const BASE_HUMIDITY: f64 = 45.0;

/// Simulated temperature/humidity sensor with a slowly draining battery.
///
/// Temperature and humidity vary around fixed baselines; humidity is clamped
/// to [20.0, 80.0]. The battery drains by a small random amount per reading
/// and saturates at zero.
pub struct VirtualSensor {
    battery_level: f64,
    rng: SmallRng,
}

impl VirtualSensor {
    pub fn new() -> Self {
        Self {
            battery_level: 100.0,
            rng: SmallRng::from_entropy(),
        }
    }

    /// Deterministic variant for tests
    pub fn with_seed(seed: u64) -> Self {
        Self {
            battery_level: 100.0,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    fn read_temperature(&mut self) -> f64 {
        let variation = self.rng.gen_range(-2.0..3.0);
        round_one_decimal(BASE_TEMPERATURE + variation)
    }

    fn read_humidity(&mut self) -> f64 {
        let variation = self.rng.gen_range(-5.0..10.0);
        round_one_decimal((BASE_HUMIDITY + variation).clamp(20.0, 80.0))
    }

    fn read_battery(&mut self) -> f64 {
        let drain = self.rng.gen_range(0.01..0.05);
        self.battery_level = (self.battery_level - drain).max(0.0);
        round_one_decimal(self.battery_level)
    }
}

impl Default for VirtualSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadingSource for VirtualSensor {
    fn next_reading(&mut self) -> Reading {
        Reading {
            temperature: self.read_temperature(),
            humidity: self.read_humidity(),
            battery_level: self.read_battery(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_humidity_stays_in_bounds() {
        let mut sensor = VirtualSensor::with_seed(7);
        for _ in 0..1000 {
            let reading = sensor.next_reading();
            assert!((20.0..=80.0).contains(&reading.humidity));
        }
    }

    #[test]
    fn test_battery_is_non_increasing() {
        let mut sensor = VirtualSensor::with_seed(42);
        let mut previous = 100.0;
        for _ in 0..1000 {
            let reading = sensor.next_reading();
            assert!(reading.battery_level <= previous);
            assert!(reading.battery_level >= 0.0);
            previous = reading.battery_level;
        }
    }

    #[test]
    fn test_seeded_sensor_is_deterministic() {
        let mut a = VirtualSensor::with_seed(123);
        let mut b = VirtualSensor::with_seed(123);
        for _ in 0..50 {
            assert_eq!(a.next_reading(), b.next_reading());
        }
    }

    #[test]
    fn test_battery_saturates_at_zero() {
        let mut sensor = VirtualSensor::with_seed(9);
        sensor.battery_level = 0.02;
        for _ in 0..10 {
            let reading = sensor.next_reading();
            assert!(reading.battery_level >= 0.0);
        }
        assert_eq!(sensor.next_reading().battery_level, 0.0);
    }
}
