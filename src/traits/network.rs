//! Network abstraction for the MQTT control link.
//!
//! The node talks to its control authority over MQTT. The transport and
//! session handling (connect, subscribe, reconnect) belong to the
//! implementation; the engine only needs non-blocking publish and receive.
//!
//! # Topics
//!
//! With root `mqtt_n` and node name `bs-1`:
//!
//! ```text
//! mqtt_n/bs-1/s1         - sensor one: free | occupied   (published)
//! mqtt_n/bs-1/s2         - sensor two: free | occupied   (published)
//! mqtt_n/bs-1/direction  - up | down                      (published)
//! mqtt_n/bs-1/forward    - aspect token, e.g. d80         (subscribed)
//! mqtt_n/bs-1/backward   - aspect token, e.g. stop        (subscribed)
//! ```

/// MQTT client trait for pub/sub messaging.
///
/// Sync-first so it works with the blocking ESP-IDF client and with a
/// desktop async client behind a channel.
///
/// # Implementation Notes
///
/// - `publish` must not block the tick loop for long; a full outbound
///   queue should be reported as an error, not waited on
/// - `try_recv` never blocks
/// - `is_connected` drives the node's link supervision and fail-safe
///
/// # Example
///
/// ```rust,ignore
/// use rs_blocksig::traits::MqttClient;
///
/// fn report<M: MqttClient>(client: &mut M) {
///     client.publish("mqtt_n/bs-1/s1", b"occupied", true).unwrap();
/// }
/// ```
pub trait MqttClient {
    /// Error type for MQTT operations.
    type Error: core::fmt::Debug;

    /// Publish a message to a topic.
    ///
    /// # Arguments
    /// - `topic`: MQTT topic path
    /// - `payload`: Message bytes
    /// - `retain`: If true, broker keeps message for new subscribers
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error>;

    /// Subscribe to a topic.
    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error>;

    /// Try to receive the next message (non-blocking).
    fn try_recv(&mut self) -> Option<MqttMessage>;

    /// Check if connected to broker.
    fn is_connected(&self) -> bool;
}

/// An MQTT message received from a subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MqttMessage {
    /// Topic the message was published to.
    pub topic: String,
    /// Message payload as raw bytes.
    pub payload: Vec<u8>,
}

impl MqttMessage {
    /// Create a new MQTT message.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Returns the payload as a UTF-8 string, if valid.
    pub fn payload_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.payload).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_str_valid_utf8() {
        let msg = MqttMessage::new("mqtt_n/bs-1/forward", b"d80".to_vec());
        assert_eq!(msg.payload_str(), Some("d80"));
    }

    #[test]
    fn payload_str_invalid_utf8() {
        let msg = MqttMessage::new("mqtt_n/bs-1/forward", vec![0xff, 0xfe]);
        assert_eq!(msg.payload_str(), None);
    }
}
