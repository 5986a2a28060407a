//! Trait definitions for hardware abstraction and networking.
//!
//! This module defines the abstractions that allow rs-blocksig to:
//! - Run on different hardware (ESP32, desktop mock)
//! - Use different MQTT client implementations
//!
//! # Submodules
//!
//! - `hardware`: Lamp outputs, block sensors, clock
//! - `network`: MQTT client trait and message type

pub mod hardware;
pub mod network;

pub use hardware::*;
pub use network::*;
