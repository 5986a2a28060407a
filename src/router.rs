//! Message router: topic/payload mapping in both directions.
//!
//! Inbound, an aspect token (or numeric aspect code) on
//! `<root>/<node>/<signal_id>` becomes an [`AspectCommand`] for that signal. Outbound, occupancy events become
//! retained publications on the sensor and direction topics. Each topic
//! remembers the last value sent so repeats are suppressed.
//!
//! ```rust
//! use rs_blocksig::config::NodeConfig;
//! use rs_blocksig::occupancy::{OccupancyEvent, Sensor};
//! use rs_blocksig::router::MessageRouter;
//! use rs_blocksig::traits::MqttMessage;
//!
//! let mut router = MessageRouter::new(&NodeConfig::default());
//!
//! let cmd = router
//!     .route_inbound(&MqttMessage::new("mqtt_n/bs-1/forward", "d80"))
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(cmd.aspect.wire_token(), Some("d80"));
//!
//! let event = OccupancyEvent::SensorChanged { sensor: Sensor::One, occupied: true };
//! let publication = router.outbound(&event).unwrap();
//! assert_eq!(publication.topic.as_str(), "mqtt_n/bs-1/s1");
//! assert_eq!(publication.payload, "occupied");
//! assert!(router.outbound(&event).is_none());
//! ```

use log::debug;

use crate::aspect::Aspect;
use crate::config::{LongString, NodeConfig};
use crate::error::SignalError;
use crate::occupancy::{OccupancyEvent, Sensor, TravelDirection};
use crate::signal::SignalDirection;
use crate::traits::{MqttClient, MqttMessage};

/// Payload for a free sensor.
pub const PAYLOAD_FREE: &str = "free";
/// Payload for an occupied sensor.
pub const PAYLOAD_OCCUPIED: &str = "occupied";

/// An inbound aspect request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AspectCommand {
    /// Addressed signal.
    pub direction: SignalDirection,
    /// Requested aspect.
    pub aspect: Aspect,
}

/// One outbound message. Always published retained.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Publication {
    /// Full topic.
    pub topic: LongString,
    /// Payload token.
    pub payload: &'static str,
}

/// Router counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouterStats {
    /// Messages on topics the node does not serve.
    pub unknown_topics: u32,
    /// Messages whose payload is not an aspect token.
    pub malformed_messages: u32,
    /// Publications dropped because the link refused them.
    pub publish_failures: u32,
    /// Publications handed to the link.
    pub published: u32,
}

/// Maps topics to commands and state changes to publications.
#[derive(Clone, Debug)]
pub struct MessageRouter {
    sensor_topics: [LongString; 2],
    direction_topic: LongString,
    signal_topics: [LongString; 2],
    sensors: [bool; 2],
    direction: TravelDirection,
    published_sensors: [Option<bool>; 2],
    stats: RouterStats,
}

impl MessageRouter {
    /// Build all topics from config.
    pub fn new(config: &NodeConfig) -> Self {
        let block = &config.block;
        Self {
            sensor_topics: [
                config.topic(block.sensor_one_topic.as_str()),
                config.topic(block.sensor_two_topic.as_str()),
            ],
            direction_topic: config.topic(block.direction_topic.as_str()),
            signal_topics: SignalDirection::ALL
                .map(|d| config.topic(config.signals.get(d).id.as_str())),
            sensors: [false; 2],
            direction: TravelDirection::Unknown,
            published_sensors: [None; 2],
            stats: RouterStats::default(),
        }
    }

    /// Topics the node subscribes to.
    pub fn subscriptions(&self) -> impl Iterator<Item = &str> {
        self.signal_topics.iter().map(|t| t.as_str())
    }

    /// Subscribe to every signal topic. Stops at the first failure.
    pub fn subscribe_all<M: MqttClient>(&self, client: &mut M) -> Result<(), M::Error> {
        for topic in self.subscriptions() {
            client.subscribe(topic)?;
        }
        Ok(())
    }

    /// Map an inbound message to a command.
    ///
    /// Returns `Ok(None)` for a topic the node does not serve and
    /// [`SignalError::MalformedMessage`] for a payload that is neither an
    /// aspect token nor an aspect code. Both are counted.
    pub fn route_inbound(&mut self, msg: &MqttMessage) -> Result<Option<AspectCommand>, SignalError> {
        let Some(direction) = SignalDirection::ALL
            .into_iter()
            .find(|d| self.signal_topics[d.index()].as_str() == msg.topic)
        else {
            self.stats.unknown_topics += 1;
            debug!("ignoring message on unknown topic {}", msg.topic);
            return Ok(None);
        };

        match msg.payload_str().and_then(Aspect::from_payload) {
            Some(aspect) => Ok(Some(AspectCommand { direction, aspect })),
            None => {
                self.stats.malformed_messages += 1;
                debug!("dropping malformed payload {:?} on {}", msg.payload, msg.topic);
                Err(SignalError::MalformedMessage {
                    topic: msg.topic.clone(),
                })
            }
        }
    }

    /// Publication for an occupancy event, if it changes what was last sent.
    ///
    /// Block-level `OccupiedChanged` is carried by the per-sensor topics and
    /// produces nothing here. An unknown direction is tracked but never sent.
    pub fn outbound(&mut self, event: &OccupancyEvent) -> Option<Publication> {
        match *event {
            OccupancyEvent::SensorChanged { sensor, occupied } => {
                self.sensors[sensor.index()] = occupied;
                if self.published_sensors[sensor.index()] == Some(occupied) {
                    return None;
                }
                self.published_sensors[sensor.index()] = Some(occupied);
                Some(self.sensor_publication(sensor))
            }
            OccupancyEvent::DirectionChanged(direction) => {
                if direction == self.direction {
                    return None;
                }
                self.direction = direction;
                self.direction_publication()
            }
            OccupancyEvent::OccupiedChanged(_) | OccupancyEvent::DirectionAmbiguous => None,
        }
    }

    /// Publications restating the current state, for a fresh connection.
    pub fn resync(&mut self) -> heapless::Vec<Publication, 3> {
        let mut out = heapless::Vec::new();
        for sensor in Sensor::BOTH {
            self.published_sensors[sensor.index()] = Some(self.sensors[sensor.index()]);
            let _ = out.push(self.sensor_publication(sensor));
        }
        if let Some(direction) = self.direction_publication() {
            let _ = out.push(direction);
        }
        out
    }

    /// Forget the block state after a node reset.
    ///
    /// Returns the sensor topics whose last sent value was not `free`, so
    /// the broker stops showing a train the node no longer tracks.
    pub fn reset(&mut self) -> heapless::Vec<Publication, 2> {
        self.sensors = [false; 2];
        self.direction = TravelDirection::Unknown;
        let mut out = heapless::Vec::new();
        for sensor in Sensor::BOTH {
            if self.published_sensors[sensor.index()] == Some(true) {
                self.published_sensors[sensor.index()] = Some(false);
                let _ = out.push(self.sensor_publication(sensor));
            }
        }
        out
    }

    /// Send one publication, retained. Failures are counted and dropped.
    pub fn publish<M: MqttClient>(&mut self, client: &mut M, publication: &Publication) -> bool {
        if !client.is_connected() {
            self.stats.publish_failures += 1;
            debug!(
                "dropping {}={}: {}",
                publication.topic,
                publication.payload,
                SignalError::LinkUnavailable
            );
            return false;
        }
        match client.publish(publication.topic.as_str(), publication.payload.as_bytes(), true) {
            Ok(()) => {
                self.stats.published += 1;
                true
            }
            Err(err) => {
                self.stats.publish_failures += 1;
                debug!("publish {} failed: {err:?}", publication.topic);
                false
            }
        }
    }

    fn sensor_publication(&self, sensor: Sensor) -> Publication {
        let payload = if self.sensors[sensor.index()] {
            PAYLOAD_OCCUPIED
        } else {
            PAYLOAD_FREE
        };
        Publication {
            topic: self.sensor_topics[sensor.index()].clone(),
            payload,
        }
    }

    fn direction_publication(&self) -> Option<Publication> {
        self.direction.wire_token().map(|payload| Publication {
            topic: self.direction_topic.clone(),
            payload,
        })
    }

    /// Counters so far.
    pub fn stats(&self) -> RouterStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NodeIdentity, SignalConfig, SignalsConfig};
    use crate::aspect::SignalType;
    use crate::hal::MockMqtt;

    fn router() -> MessageRouter {
        MessageRouter::new(&NodeConfig::default())
    }

    #[test]
    fn routes_both_signals() {
        let mut router = router();
        let cmd = router
            .route_inbound(&MqttMessage::new("mqtt_n/bs-1/backward", "d40short"))
            .unwrap();
        assert_eq!(
            cmd,
            Some(AspectCommand {
                direction: SignalDirection::Backward,
                aspect: Aspect::ShortRoute
            })
        );
    }

    #[test]
    fn numeric_code_requests_all_flash() {
        let mut router = router();
        let cmd = router
            .route_inbound(&MqttMessage::new("mqtt_n/bs-1/forward", "255"))
            .unwrap();
        assert_eq!(cmd.map(|c| c.aspect), Some(Aspect::AllFlash));
    }

    #[test]
    fn custom_signal_ids() {
        let config = NodeConfig::default()
            .with_node(NodeIdentity::default().with_name("bs-9"))
            .with_signals(
                SignalsConfig::default().with_forward(SignalConfig::new("east", SignalType::Hsi3)),
            );
        let mut router = MessageRouter::new(&config);
        let subs: Vec<&str> = router.subscriptions().collect();
        assert_eq!(subs, vec!["mqtt_n/bs-9/east", "mqtt_n/bs-9/backward"]);

        let cmd = router
            .route_inbound(&MqttMessage::new("mqtt_n/bs-9/east", "stop"))
            .unwrap();
        assert_eq!(cmd.map(|c| c.direction), Some(SignalDirection::Forward));
    }

    #[test]
    fn unknown_topic_dropped_and_counted() {
        let mut router = router();
        assert_eq!(
            router.route_inbound(&MqttMessage::new("mqtt_n/bs-2/forward", "d80")),
            Ok(None)
        );
        assert_eq!(
            router.route_inbound(&MqttMessage::new("mqtt_n/bs-1/Forward", "d80")),
            Ok(None)
        );
        assert_eq!(router.stats().unknown_topics, 2);
    }

    #[test]
    fn malformed_payload_dropped_and_counted() {
        let mut router = router();
        let err = router
            .route_inbound(&MqttMessage::new("mqtt_n/bs-1/forward", "green"))
            .unwrap_err();
        assert_eq!(
            err,
            SignalError::MalformedMessage {
                topic: "mqtt_n/bs-1/forward".into()
            }
        );
        assert!(router
            .route_inbound(&MqttMessage::new("mqtt_n/bs-1/forward", vec![0xff]))
            .is_err());
        assert_eq!(router.stats().malformed_messages, 2);
    }

    #[test]
    fn sensor_changes_publish_once() {
        let mut router = router();
        let occupied = OccupancyEvent::SensorChanged { sensor: Sensor::Two, occupied: true };
        let free = OccupancyEvent::SensorChanged { sensor: Sensor::Two, occupied: false };

        assert_eq!(router.outbound(&occupied).map(|p| p.payload), Some("occupied"));
        assert!(router.outbound(&occupied).is_none());
        assert_eq!(router.outbound(&free).map(|p| p.payload), Some("free"));
        assert!(router.outbound(&OccupancyEvent::OccupiedChanged(true)).is_none());
    }

    #[test]
    fn direction_published_per_episode() {
        let mut router = router();
        let up = OccupancyEvent::DirectionChanged(TravelDirection::Forward);
        let reset = OccupancyEvent::DirectionChanged(TravelDirection::Unknown);

        let p = router.outbound(&up).unwrap();
        assert_eq!(p.topic.as_str(), "mqtt_n/bs-1/direction");
        assert_eq!(p.payload, "up");
        assert!(router.outbound(&reset).is_none());
        assert_eq!(router.outbound(&up).map(|p| p.payload), Some("up"));

        let down = OccupancyEvent::DirectionChanged(TravelDirection::Backward);
        assert_eq!(router.outbound(&down).map(|p| p.payload), Some("down"));
    }

    #[test]
    fn publish_retained_and_counts_failures() {
        let mut router = router();
        let mut mqtt = MockMqtt::new();
        let p = router
            .outbound(&OccupancyEvent::SensorChanged { sensor: Sensor::One, occupied: true })
            .unwrap();

        assert!(router.publish(&mut mqtt, &p));
        assert_eq!(
            mqtt.published,
            vec![("mqtt_n/bs-1/s1".to_string(), b"occupied".to_vec(), true)]
        );

        mqtt.connected = false;
        assert!(!router.publish(&mut mqtt, &p));

        mqtt.connected = true;
        mqtt.fail_publish = true;
        assert!(!router.publish(&mut mqtt, &p));

        let stats = router.stats();
        assert_eq!(stats.published, 1);
        assert_eq!(stats.publish_failures, 2);
        assert_eq!(mqtt.published.len(), 1);
    }

    #[test]
    fn resync_restates_current_state() {
        let mut router = router();
        router.outbound(&OccupancyEvent::SensorChanged { sensor: Sensor::One, occupied: true });
        router.outbound(&OccupancyEvent::DirectionChanged(TravelDirection::Forward));

        let all = router.resync();
        let pairs: Vec<(&str, &str)> = all.iter().map(|p| (p.topic.as_str(), p.payload)).collect();
        assert_eq!(
            pairs,
            vec![
                ("mqtt_n/bs-1/s1", "occupied"),
                ("mqtt_n/bs-1/s2", "free"),
                ("mqtt_n/bs-1/direction", "up"),
            ]
        );

        // After a resync an unchanged sensor stays quiet
        assert!(router
            .outbound(&OccupancyEvent::SensorChanged { sensor: Sensor::Two, occupied: false })
            .is_none());
    }

    #[test]
    fn reset_clears_published_occupancy() {
        let mut router = router();
        router.outbound(&OccupancyEvent::SensorChanged { sensor: Sensor::One, occupied: true });
        router.outbound(&OccupancyEvent::DirectionChanged(TravelDirection::Forward));

        let cleared = router.reset();
        let pairs: Vec<(&str, &str)> =
            cleared.iter().map(|p| (p.topic.as_str(), p.payload)).collect();
        assert_eq!(pairs, vec![("mqtt_n/bs-1/s1", "free")]);
        assert!(router.reset().is_empty());

        // The next episode reports again
        let p = router
            .outbound(&OccupancyEvent::SensorChanged { sensor: Sensor::One, occupied: true })
            .unwrap();
        assert_eq!(p.payload, "occupied");
        let p = router
            .outbound(&OccupancyEvent::DirectionChanged(TravelDirection::Forward))
            .unwrap();
        assert_eq!(p.payload, "up");
    }

    #[test]
    fn subscribe_all_topics() {
        let router = router();
        let mut mqtt = MockMqtt::new();
        router.subscribe_all(&mut mqtt).unwrap();
        assert_eq!(
            mqtt.subscriptions,
            vec!["mqtt_n/bs-1/forward".to_string(), "mqtt_n/bs-1/backward".to_string()]
        );
    }
}
