//! Block occupancy and direction detection from two IR sensors.
//!
//! Sensor one sits at the "up" end of the block, sensor two at the "down"
//! end. A train entering over sensor one is travelling forward (published as
//! `up`), one entering over sensor two backward (`down`).
//!
//! Raw readings pass through a [`Debouncer`] each; accepted edges reach the
//! [`OccupancyDetector`] through the node's event queue.
//!
//! # Direction window
//!
//! The first sensor to trip in an episode is held for
//! `simultaneous_window_ms`. If the other sensor trips inside the window the
//! direction cannot be told and stays [`TravelDirection::Unknown`]. Otherwise
//! [`poll`](OccupancyDetector::poll) asserts it once the window has passed.
//!
//! ```rust
//! use rs_blocksig::occupancy::{OccupancyDetector, OccupancyEvent, Sensor, TravelDirection};
//!
//! let mut block = OccupancyDetector::new(100);
//! block.on_sensor_edge(Sensor::One, true, 1_000);
//! assert!(block.is_occupied());
//! assert_eq!(block.poll(1_050), None);
//! assert_eq!(
//!     block.poll(1_100),
//!     Some(OccupancyEvent::DirectionChanged(TravelDirection::Forward))
//! );
//! ```

use core::fmt;

use log::{debug, warn};

use crate::error::SignalError;

/// One of the block's two sensors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Sensor {
    /// Sensor at the up end (`s1`).
    One,
    /// Sensor at the down end (`s2`).
    Two,
}

impl Sensor {
    /// Both sensors.
    pub const BOTH: [Sensor; 2] = [Sensor::One, Sensor::Two];

    /// Array index (0 or 1).
    pub fn index(self) -> usize {
        match self {
            Sensor::One => 0,
            Sensor::Two => 1,
        }
    }

    /// The sensor at the other end of the block.
    pub fn other(self) -> Sensor {
        match self {
            Sensor::One => Sensor::Two,
            Sensor::Two => Sensor::One,
        }
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sensor::One => f.write_str("s1"),
            Sensor::Two => f.write_str("s2"),
        }
    }
}

/// Direction of travel through the block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TravelDirection {
    /// Not asserted (block free, or both sensors tripped together).
    #[default]
    Unknown,
    /// Entered over sensor one.
    Forward,
    /// Entered over sensor two.
    Backward,
}

impl TravelDirection {
    /// Payload published on the direction topic. `Unknown` is never published.
    pub fn wire_token(self) -> Option<&'static str> {
        match self {
            TravelDirection::Forward => Some("up"),
            TravelDirection::Backward => Some("down"),
            TravelDirection::Unknown => None,
        }
    }

    fn entered_over(sensor: Sensor) -> Self {
        match sensor {
            Sensor::One => TravelDirection::Forward,
            Sensor::Two => TravelDirection::Backward,
        }
    }
}

// ============================================================================
// Debouncer
// ============================================================================

/// Accepts a raw reading only after it has been stable for `debounce_ms`.
///
/// Starts in the free (`false`) state.
///
/// ```rust
/// use rs_blocksig::occupancy::Debouncer;
///
/// let mut d = Debouncer::new(50);
/// assert_eq!(d.sample(true, 0), None);
/// assert_eq!(d.sample(true, 30), None);
/// assert_eq!(d.sample(true, 50), Some(true));
/// assert_eq!(d.sample(true, 70), None);
/// ```
#[derive(Clone, Debug)]
pub struct Debouncer {
    debounce_ms: u32,
    stable: bool,
    candidate_since: Option<u64>,
}

impl Debouncer {
    /// Create a debouncer in the free state.
    pub fn new(debounce_ms: u32) -> Self {
        Self {
            debounce_ms,
            stable: false,
            candidate_since: None,
        }
    }

    /// Feed one raw sample. Returns the new state when a change is accepted.
    pub fn sample(&mut self, raw: bool, now_ms: u64) -> Option<bool> {
        if raw == self.stable {
            self.candidate_since = None;
            return None;
        }

        let since = *self.candidate_since.get_or_insert(now_ms);
        if now_ms.saturating_sub(since) >= u64::from(self.debounce_ms) {
            self.stable = raw;
            self.candidate_since = None;
            Some(raw)
        } else {
            None
        }
    }

    /// Last accepted state.
    pub fn state(&self) -> bool {
        self.stable
    }

    /// Return to the free state.
    pub fn reset(&mut self) {
        self.stable = false;
        self.candidate_since = None;
    }
}

// ============================================================================
// Detector
// ============================================================================

/// State change reported by the detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OccupancyEvent {
    /// One sensor changed.
    SensorChanged {
        /// Which sensor.
        sensor: Sensor,
        /// New reading.
        occupied: bool,
    },
    /// The block as a whole changed between free and occupied.
    OccupiedChanged(bool),
    /// The episode's direction was asserted or reset.
    DirectionChanged(TravelDirection),
    /// Both sensors tripped inside the window; direction stays unknown.
    DirectionAmbiguous,
}

/// Events from one edge. Capacity covers the worst case of a single edge.
pub type OccupancyEvents = heapless::Vec<OccupancyEvent, 4>;

/// Tracks both sensors, block occupancy and travel direction.
#[derive(Clone, Debug)]
pub struct OccupancyDetector {
    window_ms: u32,
    sensors: [bool; 2],
    direction: TravelDirection,
    pending: Option<(Sensor, u64)>,
}

impl OccupancyDetector {
    /// Create a detector with both sensors free.
    pub fn new(simultaneous_window_ms: u32) -> Self {
        Self {
            window_ms: simultaneous_window_ms,
            sensors: [false; 2],
            direction: TravelDirection::Unknown,
            pending: None,
        }
    }

    /// Record a debounced transition of one sensor.
    ///
    /// Repeated readings produce no events.
    pub fn on_sensor_edge(&mut self, sensor: Sensor, occupied: bool, now_ms: u64) -> OccupancyEvents {
        let mut events = OccupancyEvents::new();
        if self.sensors[sensor.index()] == occupied {
            return events;
        }

        let was_occupied = self.is_occupied();
        self.sensors[sensor.index()] = occupied;
        push(&mut events, OccupancyEvent::SensorChanged { sensor, occupied });

        if occupied && !was_occupied {
            push(&mut events, OccupancyEvent::OccupiedChanged(true));
            self.pending = Some((sensor, now_ms));
        } else if occupied {
            if let Some((first, at)) = self.pending {
                if first != sensor && now_ms.saturating_sub(at) <= u64::from(self.window_ms) {
                    self.pending = None;
                    warn!("{first} then {sensor}: {}", SignalError::AmbiguousDirection);
                    push(&mut events, OccupancyEvent::DirectionAmbiguous);
                }
            }
        } else if was_occupied && !self.is_occupied() {
            self.pending = None;
            push(&mut events, OccupancyEvent::OccupiedChanged(false));
            if self.direction != TravelDirection::Unknown {
                self.direction = TravelDirection::Unknown;
                push(&mut events, OccupancyEvent::DirectionChanged(TravelDirection::Unknown));
            }
        }

        events
    }

    /// Assert the direction once the first trip has outlived the window.
    pub fn poll(&mut self, now_ms: u64) -> Option<OccupancyEvent> {
        let (first, at) = self.pending?;
        if now_ms.saturating_sub(at) < u64::from(self.window_ms) {
            return None;
        }

        self.pending = None;
        let direction = TravelDirection::entered_over(first);
        debug!("block entered over {first}, direction {direction:?}");
        if direction == self.direction {
            return None;
        }
        self.direction = direction;
        Some(OccupancyEvent::DirectionChanged(direction))
    }

    /// Current reading of one sensor.
    pub fn sensor(&self, sensor: Sensor) -> bool {
        self.sensors[sensor.index()]
    }

    /// OR of both sensors.
    pub fn is_occupied(&self) -> bool {
        self.sensors[0] || self.sensors[1]
    }

    /// Direction of the current episode.
    pub fn direction(&self) -> TravelDirection {
        self.direction
    }

    /// Both sensors free, direction unknown.
    pub fn reset(&mut self) {
        self.sensors = [false; 2];
        self.direction = TravelDirection::Unknown;
        self.pending = None;
    }
}

fn push(events: &mut OccupancyEvents, event: OccupancyEvent) {
    // At most three events per edge.
    let _ = events.push(event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debouncer_rejects_bounce() {
        let mut d = Debouncer::new(50);
        assert_eq!(d.sample(true, 0), None);
        assert_eq!(d.sample(false, 20), None);
        assert_eq!(d.sample(true, 40), None);
        assert_eq!(d.sample(true, 80), None);
        assert_eq!(d.sample(true, 90), Some(true));
        assert!(d.state());
    }

    #[test]
    fn debouncer_never_changes_on_unstable_input() {
        let mut d = Debouncer::new(50);
        for t in 0..100u64 {
            assert_eq!(d.sample(t % 2 == 0, t * 10), None);
        }
        assert!(!d.state());
    }

    #[test]
    fn debouncer_zero_accepts_immediately() {
        let mut d = Debouncer::new(0);
        assert_eq!(d.sample(true, 5), Some(true));
        assert_eq!(d.sample(false, 6), Some(false));
    }

    #[test]
    fn forward_when_sensor_one_first() {
        let mut block = OccupancyDetector::new(100);
        let events = block.on_sensor_edge(Sensor::One, true, 0);
        assert_eq!(
            events.as_slice(),
            &[
                OccupancyEvent::SensorChanged { sensor: Sensor::One, occupied: true },
                OccupancyEvent::OccupiedChanged(true),
            ]
        );
        assert_eq!(block.poll(99), None);
        assert_eq!(
            block.poll(100),
            Some(OccupancyEvent::DirectionChanged(TravelDirection::Forward))
        );
        assert_eq!(block.poll(200), None);

        // Second sensor later in the episode does not change direction
        let events = block.on_sensor_edge(Sensor::Two, true, 500);
        assert_eq!(events.len(), 1);
        assert_eq!(block.direction(), TravelDirection::Forward);
    }

    #[test]
    fn backward_when_sensor_two_first() {
        let mut block = OccupancyDetector::new(100);
        block.on_sensor_edge(Sensor::Two, true, 0);
        block.on_sensor_edge(Sensor::One, true, 300);
        assert_eq!(
            block.poll(300),
            Some(OccupancyEvent::DirectionChanged(TravelDirection::Backward))
        );
    }

    #[test]
    fn simultaneous_trip_is_ambiguous() {
        let mut block = OccupancyDetector::new(100);
        block.on_sensor_edge(Sensor::One, true, 0);
        let events = block.on_sensor_edge(Sensor::Two, true, 60);
        assert!(events.contains(&OccupancyEvent::DirectionAmbiguous));
        assert_eq!(block.poll(500), None);
        assert_eq!(block.direction(), TravelDirection::Unknown);
        assert!(block.is_occupied());
    }

    #[test]
    fn zero_window_same_instant_is_ambiguous() {
        let mut block = OccupancyDetector::new(0);
        block.on_sensor_edge(Sensor::One, true, 40);
        let events = block.on_sensor_edge(Sensor::Two, true, 40);
        assert!(events.contains(&OccupancyEvent::DirectionAmbiguous));
        assert_eq!(block.poll(40), None);
    }

    #[test]
    fn clearing_resets_direction() {
        let mut block = OccupancyDetector::new(100);
        block.on_sensor_edge(Sensor::One, true, 0);
        block.poll(100);
        block.on_sensor_edge(Sensor::Two, true, 400);
        block.on_sensor_edge(Sensor::One, false, 600);
        assert!(block.is_occupied());

        let events = block.on_sensor_edge(Sensor::Two, false, 900);
        assert_eq!(
            events.as_slice(),
            &[
                OccupancyEvent::SensorChanged { sensor: Sensor::Two, occupied: false },
                OccupancyEvent::OccupiedChanged(false),
                OccupancyEvent::DirectionChanged(TravelDirection::Unknown),
            ]
        );
        assert_eq!(block.direction(), TravelDirection::Unknown);
    }

    #[test]
    fn repeated_readings_are_silent() {
        let mut block = OccupancyDetector::new(100);
        block.on_sensor_edge(Sensor::One, true, 0);
        assert!(block.on_sensor_edge(Sensor::One, true, 10).is_empty());
        assert!(block.on_sensor_edge(Sensor::Two, false, 10).is_empty());
    }

    #[test]
    fn short_flicker_asserts_nothing() {
        let mut block = OccupancyDetector::new(100);
        block.on_sensor_edge(Sensor::One, true, 0);
        block.on_sensor_edge(Sensor::One, false, 50);
        assert_eq!(block.poll(200), None);
        assert_eq!(block.direction(), TravelDirection::Unknown);
    }

    #[test]
    fn direction_tokens() {
        assert_eq!(TravelDirection::Forward.wire_token(), Some("up"));
        assert_eq!(TravelDirection::Backward.wire_token(), Some("down"));
        assert_eq!(TravelDirection::Unknown.wire_token(), None);
        assert_eq!(Sensor::Two.to_string(), "s2");
        assert_eq!(Sensor::One.other(), Sensor::Two);
    }
}
