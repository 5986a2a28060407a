//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for all hardware and network traits,
//! so the whole node can run on a desktop.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockLamp`] | [`LampOutput`] | Records every level written |
//! | [`MockSensor`] | [`SensorInput`] | Settable raw reading |
//! | [`MockClock`] | [`Clock`] | Controllable time source |
//! | [`MockMqtt`] | [`MqttClient`] | Captures pub/sub operations |
//!
//! # Example
//!
//! ```rust
//! use rs_blocksig::hal::{MockLamp, MockMqtt, MockSensor};
//! use rs_blocksig::config::NodeConfig;
//! use rs_blocksig::BlockNode;
//!
//! let mut node = BlockNode::new(
//!     NodeConfig::default(),
//!     [MockSensor::new(), MockSensor::new()],
//!     [MockLamp::new()],
//!     [MockLamp::new()],
//!     MockMqtt::new(),
//! );
//!
//! node.sensor_mut(rs_blocksig::occupancy::Sensor::One).set_occupied(true);
//! node.tick(0).unwrap();
//! ```
//!
//! [`LampOutput`]: crate::traits::LampOutput
//! [`SensorInput`]: crate::traits::SensorInput
//! [`Clock`]: crate::traits::Clock
//! [`MqttClient`]: crate::traits::MqttClient

use std::collections::VecDeque;

use crate::traits::{Clock, LampOutput, MqttClient, MqttMessage, SensorInput};

// ============================================================================
// Hardware Mocks
// ============================================================================

/// Mock lamp output.
///
/// Records every write. Set `fail` to make writes return an error.
///
/// # Example
///
/// ```rust
/// use rs_blocksig::hal::MockLamp;
/// use rs_blocksig::traits::LampOutput;
///
/// let mut lamp = MockLamp::new();
/// lamp.set_level(200).unwrap();
/// lamp.off().unwrap();
///
/// assert_eq!(lamp.level, 0);
/// assert_eq!(lamp.history, vec![200, 0]);
/// assert_eq!(lamp.write_count, 2);
/// ```
#[derive(Debug, Default)]
pub struct MockLamp {
    /// Last level written.
    pub level: u8,
    /// Every level written, oldest first.
    pub history: Vec<u8>,
    /// Number of writes.
    pub write_count: usize,
    /// Fail every write.
    pub fail: bool,
}

impl MockLamp {
    /// Creates a dark mock lamp.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes that lit the lamp at all.
    pub fn lit_writes(&self) -> usize {
        self.history.iter().filter(|&&l| l > 0).count()
    }
}

impl LampOutput for MockLamp {
    type Error = ();

    fn set_level(&mut self, level: u8) -> Result<(), ()> {
        if self.fail {
            return Err(());
        }
        self.level = level;
        self.history.push(level);
        self.write_count += 1;
        Ok(())
    }
}

/// Mock IR sensor.
///
/// # Example
///
/// ```rust
/// use rs_blocksig::hal::MockSensor;
/// use rs_blocksig::traits::SensorInput;
///
/// let mut sensor = MockSensor::new();
/// assert!(!sensor.is_occupied().unwrap());
///
/// sensor.set_occupied(true);
/// assert!(sensor.is_occupied().unwrap());
/// assert_eq!(sensor.reads, 2);
/// ```
#[derive(Debug, Default)]
pub struct MockSensor {
    /// Raw reading returned by `is_occupied`.
    pub occupied: bool,
    /// Number of reads.
    pub reads: usize,
    /// Fail every read.
    pub fail: bool,
}

impl MockSensor {
    /// Creates a sensor reading free.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the raw reading.
    pub fn set_occupied(&mut self, occupied: bool) {
        self.occupied = occupied;
    }
}

impl SensorInput for MockSensor {
    type Error = ();

    fn is_occupied(&mut self) -> Result<bool, ()> {
        if self.fail {
            return Err(());
        }
        self.reads += 1;
        Ok(self.occupied)
    }
}

/// Mock clock for testing.
///
/// Provides a controllable time source for testing time-dependent behavior.
///
/// # Example
///
/// ```rust
/// use rs_blocksig::hal::MockClock;
/// use rs_blocksig::traits::Clock;
///
/// let mut clock = MockClock::new();
/// clock.set(1000);
/// clock.advance(20);
/// assert_eq!(clock.now_ms(), 1020);
/// ```
#[derive(Debug, Default)]
pub struct MockClock {
    current_ms: u64,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current time in milliseconds.
    pub fn set(&mut self, ms: u64) {
        self.current_ms = ms;
    }

    /// Advances the clock by the given duration.
    pub fn advance(&mut self, ms: u64) {
        self.current_ms += ms;
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms
    }
}

// ============================================================================
// Network Mocks
// ============================================================================

/// Mock MQTT client for testing.
///
/// Records all publish/subscribe operations and allows injecting
/// incoming messages. Starts connected.
///
/// # Example
///
/// ```rust
/// use rs_blocksig::hal::MockMqtt;
/// use rs_blocksig::traits::MqttClient;
///
/// let mut mqtt = MockMqtt::new();
/// mqtt.queue_message("mqtt_n/bs-1/forward", "d80");
/// assert_eq!(mqtt.try_recv().unwrap().payload_str(), Some("d80"));
///
/// mqtt.publish("mqtt_n/bs-1/s1", b"occupied", true).unwrap();
/// assert_eq!(mqtt.payloads_to("mqtt_n/bs-1/s1"), vec!["occupied"]);
/// ```
#[derive(Debug, Default)]
pub struct MockMqtt {
    /// Messages that have been published (topic, payload, retain).
    pub published: Vec<(String, Vec<u8>, bool)>,
    /// Topics that have been subscribed to.
    pub subscriptions: Vec<String>,
    /// Queue of incoming messages returned by `try_recv`.
    pub incoming: VecDeque<MqttMessage>,
    /// Whether the client is connected.
    pub connected: bool,
    /// Refuse every publish.
    pub fail_publish: bool,
}

impl MockMqtt {
    /// Creates a new mock MQTT client in connected state.
    pub fn new() -> Self {
        Self {
            connected: true,
            ..Default::default()
        }
    }

    /// Creates a client that is not connected yet.
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Queue an incoming message
    pub fn queue_message(&mut self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) {
        self.incoming.push_back(MqttMessage::new(topic, payload));
    }

    /// Check if a topic was subscribed to
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.iter().any(|t| t == topic)
    }

    /// Payloads published to a topic, oldest first
    pub fn payloads_to(&self, topic: &str) -> Vec<&str> {
        self.published
            .iter()
            .filter(|(t, _, _)| t == topic)
            .filter_map(|(_, p, _)| core::str::from_utf8(p).ok())
            .collect()
    }

    /// Every publication as (topic, payload) strings, oldest first
    pub fn log(&self) -> Vec<(&str, &str)> {
        self.published
            .iter()
            .filter_map(|(t, p, _)| core::str::from_utf8(p).ok().map(|p| (t.as_str(), p)))
            .collect()
    }
}

impl MqttClient for MockMqtt {
    type Error = ();

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), ()> {
        if self.fail_publish {
            return Err(());
        }
        self.published.push((topic.into(), payload.to_vec(), retain));
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), ()> {
        self.subscriptions.push(topic.into());
        Ok(())
    }

    fn try_recv(&mut self) -> Option<MqttMessage> {
        self.incoming.pop_front()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_lamp_failure() {
        let mut lamp = MockLamp::new();
        lamp.fail = true;
        assert!(lamp.set_level(10).is_err());
        assert_eq!(lamp.write_count, 0);
        assert_eq!(lamp.lit_writes(), 0);
    }

    #[test]
    fn mock_sensor_failure() {
        let mut sensor = MockSensor::new();
        sensor.fail = true;
        assert!(sensor.is_occupied().is_err());
    }

    #[test]
    fn mock_mqtt_fifo() {
        let mut mqtt = MockMqtt::new();
        mqtt.queue_message("a", "1");
        mqtt.queue_message("b", "2");
        assert_eq!(mqtt.try_recv().unwrap().topic, "a");
        assert_eq!(mqtt.try_recv().unwrap().topic, "b");
        assert!(mqtt.try_recv().is_none());
    }

    #[test]
    fn mock_mqtt_refuses_publish() {
        let mut mqtt = MockMqtt::new();
        mqtt.fail_publish = true;
        assert!(mqtt.publish("t", b"x", false).is_err());
        assert!(mqtt.published.is_empty());
        assert!(!MockMqtt::disconnected().is_connected());
    }

    #[test]
    fn mock_mqtt_log() {
        let mut mqtt = MockMqtt::new();
        mqtt.subscribe("x/y").unwrap();
        mqtt.publish("x/s1", b"free", true).unwrap();
        assert!(mqtt.is_subscribed("x/y"));
        assert_eq!(mqtt.log(), vec![("x/s1", "free")]);
    }
}
