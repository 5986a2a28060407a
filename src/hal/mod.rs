//! Hardware Abstraction Layer implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`] for various platforms.
//!
//! # Available Implementations
//!
//! - `mock`: Test implementations for desktop development
//! - [`StdClock`]: monotonic clock for any `std` target, ESP-IDF included
//! - [`NullLink`]: always-up link with no broker behind it, for bench builds
//! - [`PinBank`]: hands out GPIOs by the numbers given in config
//! - `esp32`: ESP32-C3 SuperMini with PWM lamps and IR sensors (requires `esp32` feature)

pub mod mock;
pub mod pins;

#[cfg(feature = "esp32")]
pub mod esp32;

pub use mock::*;
pub use pins::{PinBank, PinError};

#[cfg(feature = "esp32")]
pub use esp32::*;

use core::convert::Infallible;
use std::time::Instant;

use log::debug;

use crate::traits::{Clock, MqttClient, MqttMessage};

/// Milliseconds since construction, from [`Instant`].
///
/// ```rust
/// use rs_blocksig::hal::StdClock;
/// use rs_blocksig::traits::Clock;
///
/// let clock = StdClock::new();
/// assert!(clock.now_ms() < 1_000);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct StdClock {
    start: Instant,
}

impl StdClock {
    /// Start counting from now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// A control link with nothing on the other end.
///
/// Reports itself connected so the fail-safe stays quiet, swallows every
/// publication and never delivers a message. Signals stay at Stop.
///
/// ```rust
/// use rs_blocksig::hal::NullLink;
/// use rs_blocksig::traits::MqttClient;
///
/// let mut link = NullLink::new();
/// link.publish("mqtt_n/bs-1/s1", b"free", true).unwrap();
/// assert!(link.is_connected());
/// assert!(link.try_recv().is_none());
/// assert_eq!(link.dropped(), 1);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct NullLink {
    dropped: u32,
}

impl NullLink {
    /// Create the link.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publications swallowed so far.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl MqttClient for NullLink {
    type Error = Infallible;

    fn publish(&mut self, topic: &str, payload: &[u8], _retain: bool) -> Result<(), Infallible> {
        self.dropped = self.dropped.wrapping_add(1);
        debug!("no broker, dropping {topic} ({} bytes)", payload.len());
        Ok(())
    }

    fn subscribe(&mut self, _topic: &str) -> Result<(), Infallible> {
        Ok(())
    }

    fn try_recv(&mut self) -> Option<MqttMessage> {
        None
    }

    fn is_connected(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LampConfig, NodeConfig, TimingConfig};
    use crate::{Aspect, BlockNode, NodePhase};

    #[test]
    fn bench_node_on_null_link_settles_at_stop() {
        let config = NodeConfig::default()
            .with_lamps(LampConfig::default().with_flash_at_startup(0))
            .with_timing(TimingConfig::default().with_initial_set_timeout_ms(1_000));
        let mut node = BlockNode::new(
            config,
            [MockSensor::new(), MockSensor::new()],
            [MockLamp::new()],
            [MockLamp::new()],
            NullLink::new(),
        );

        let mut t = 0;
        while t <= 10_000 {
            node.tick(t).unwrap();
            t += 20;
        }
        let state = node.state();
        assert_eq!(state.phase, NodePhase::Running);
        assert!(state.link_up);
        assert!(!state.fail_safe);
        assert_eq!(state.aspects, [Aspect::Stop, Aspect::Stop]);
        // s1 and s2 on connect
        assert_eq!(node.client().dropped(), 2);
        assert_eq!(state.stats.publish_failures, 0);
    }
}
