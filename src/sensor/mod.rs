//! Simulated environment sensor
//!
//! Produces telemetry readings without any I/O. The simulator stands in for
//! real hardware behind the [`ReadingSource`] trait so the publish loop can
//! be tested against scripted sources.

pub mod reading;
pub mod simulator;

pub use reading::Reading;
pub use simulator::{ReadingSource, VirtualSensor};
