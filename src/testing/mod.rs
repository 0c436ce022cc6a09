//! Test support utilities

pub mod mocks;

pub use mocks::{MockConnection, MockEvent};
