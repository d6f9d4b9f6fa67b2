//! Testing utilities
//!
//! A scripted loopback broker for exercising the prober without a real MQTT
//! broker.

pub mod mock_broker;

pub use mock_broker::*;
