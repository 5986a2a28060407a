//! Host-side services for running a node off the microcontroller.
//!
//! - `mqtt`: MQTT link backed by `rumqttc`, for desktop nodes and
//!   integration runs against a real broker

pub mod mqtt;

pub use mqtt::*;
