//! The block node: one tick-driven owner of sensors, signals and the link.
//!
//! [`BlockNode`] is the main loop's only entry point. Every call to
//! [`tick`](BlockNode::tick) runs the same fixed sequence:
//!
//! 1. Sample both sensors through their debouncers; accepted edges are queued
//! 2. Queue a link change if the client's connection state flipped
//! 3. Queue every inbound message the client has buffered (local commands
//!    from [`set_aspect`](BlockNode::set_aspect) are already queued)
//! 4. Process the queue in order (the only place state is mutated)
//! 5. Let the occupancy detector assert a pending direction
//! 6. Advance phases, the fail-safe and lamp animation
//!
//! The queue is a bounded FIFO, so sensor edges, commands and link changes
//! are handled in one total order. When it is full new events are dropped
//! and counted.
//!
//! # Example
//!
//! ```rust
//! use rs_blocksig::{BlockNode, NodePhase};
//! use rs_blocksig::config::{LampConfig, NodeConfig};
//! use rs_blocksig::hal::{MockLamp, MockMqtt, MockSensor};
//!
//! let config = NodeConfig::default()
//!     .with_lamps(LampConfig::default().with_flash_at_startup(0));
//! let mut node = BlockNode::new(
//!     config,
//!     [MockSensor::new(), MockSensor::new()],
//!     [MockLamp::new()],
//!     [MockLamp::new()],
//!     MockMqtt::new(),
//! );
//!
//! node.client_mut().queue_message("mqtt_n/bs-1/forward", "d80");
//! node.client_mut().queue_message("mqtt_n/bs-1/backward", "stop");
//! node.tick(0).unwrap();
//!
//! let state = node.state();
//! assert_eq!(state.phase, NodePhase::Running);
//! assert_eq!(state.aspects[0].wire_token(), Some("d80"));
//! ```

use heapless::Deque;
use log::{debug, info, warn};

use crate::aspect::Aspect;
use crate::config::NodeConfig;
use crate::error::SignalError;
use crate::occupancy::{Debouncer, OccupancyDetector, OccupancyEvent, Sensor, TravelDirection};
use crate::router::{AspectCommand, MessageRouter};
use crate::signal::{NodePhase, SignalController, SignalDirection};
use crate::traits::{LampOutput, MqttClient, MqttMessage, SensorInput};

/// Capacity of the event queue.
pub const EVENT_QUEUE_DEPTH: usize = 32;

/// Something the node has to react to, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeEvent {
    /// A debounced sensor transition.
    SensorEdge {
        /// Which sensor.
        sensor: Sensor,
        /// New state.
        occupied: bool,
        /// When the edge was accepted.
        at_ms: u64,
    },
    /// A message from the control link.
    Inbound(MqttMessage),
    /// An aspect request made locally, e.g. the all-flash override.
    Command(AspectCommand),
    /// The control link came up or went down.
    LinkChanged(bool),
}

/// Counters for everything the node tolerates instead of failing on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeStats {
    /// Payloads that were not aspect tokens.
    pub malformed_messages: u32,
    /// Messages on topics the node does not serve.
    pub unknown_topics: u32,
    /// Aspects the addressed signal cannot show.
    pub rejected_aspects: u32,
    /// Lamp levels outside 0–255.
    pub out_of_range_levels: u32,
    /// Episodes where both sensors tripped together.
    pub ambiguous_directions: u32,
    /// Publications the link refused.
    pub publish_failures: u32,
    /// Events lost to a full queue.
    pub dropped_events: u32,
    /// Times every signal was forced to Stop for link loss.
    pub fail_safe_activations: u32,
    /// Sensor reads that returned an error.
    pub sensor_faults: u32,
    /// Aspect commands accepted, including those held during start-up.
    pub commands_accepted: u32,
    /// Publications handed to the link.
    pub published: u32,
}

/// Snapshot of the node for status reporting.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeState {
    /// Boot phase.
    pub phase: NodePhase,
    /// Debounced sensor readings (s1, s2).
    pub sensors: [bool; 2],
    /// Either sensor occupied.
    pub occupied: bool,
    /// Direction of the current episode.
    pub direction: TravelDirection,
    /// Aspects shown (forward, backward).
    pub aspects: [Aspect; 2],
    /// Control link up.
    pub link_up: bool,
    /// Fail-safe holding every signal at Stop.
    pub fail_safe: bool,
    /// Counters.
    pub stats: NodeStats,
}

/// One block-signal node.
///
/// # Type Parameters
///
/// - `S`: block sensor ([`SensorInput`])
/// - `L`: signal lamp ([`LampOutput`])
/// - `M`: control link ([`MqttClient`])
pub struct BlockNode<S: SensorInput, L: LampOutput, M: MqttClient> {
    config: NodeConfig,
    sensors: [S; 2],
    debouncers: [Debouncer; 2],
    detector: OccupancyDetector,
    controller: SignalController<L>,
    router: MessageRouter,
    client: M,
    queue: Deque<NodeEvent, EVENT_QUEUE_DEPTH>,
    link_up: bool,
    stats: NodeStats,
}

impl<S: SensorInput, L: LampOutput, M: MqttClient> BlockNode<S, L, M> {
    /// Create a node. Sensors are `[s1, s2]`.
    pub fn new(
        config: NodeConfig,
        sensors: [S; 2],
        forward_lamps: impl IntoIterator<Item = L>,
        backward_lamps: impl IntoIterator<Item = L>,
        client: M,
    ) -> Self {
        let debounce_ms = config.block.debounce_ms;
        Self {
            sensors,
            debouncers: [Debouncer::new(debounce_ms), Debouncer::new(debounce_ms)],
            detector: OccupancyDetector::new(config.block.simultaneous_window_ms),
            controller: SignalController::new(&config, forward_lamps, backward_lamps),
            router: MessageRouter::new(&config),
            client,
            queue: Deque::new(),
            link_up: false,
            stats: NodeStats::default(),
            config,
        }
    }

    /// Run one scheduler step. Call every `tick_ms`.
    ///
    /// Only lamp write errors escape; everything else is counted.
    pub fn tick(&mut self, now_ms: u64) -> Result<(), L::Error> {
        self.sample_sensors(now_ms);

        let connected = self.client.is_connected();
        if connected != self.link_up {
            self.push_event(NodeEvent::LinkChanged(connected));
        }
        while let Some(msg) = self.client.try_recv() {
            self.push_event(NodeEvent::Inbound(msg));
        }

        while let Some(event) = self.queue.pop_front() {
            self.handle(event, now_ms);
        }

        if let Some(event) = self.detector.poll(now_ms) {
            self.emit(event);
        }

        self.controller.tick(now_ms)
    }

    /// Queue an event for the next tick. Returns false if it was dropped.
    pub fn push_event(&mut self, event: NodeEvent) -> bool {
        match self.queue.push_back(event) {
            Ok(()) => true,
            Err(event) => {
                self.stats.dropped_events += 1;
                warn!("event queue full, dropping {event:?}");
                false
            }
        }
    }

    fn sample_sensors(&mut self, now_ms: u64) {
        for sensor in Sensor::BOTH {
            let i = sensor.index();
            match self.sensors[i].is_occupied() {
                Ok(raw) => {
                    if let Some(occupied) = self.debouncers[i].sample(raw, now_ms) {
                        self.push_event(NodeEvent::SensorEdge {
                            sensor,
                            occupied,
                            at_ms: now_ms,
                        });
                    }
                }
                Err(_) => {
                    self.stats.sensor_faults += 1;
                    debug!("{sensor} read failed, keeping last state");
                }
            }
        }
    }

    fn handle(&mut self, event: NodeEvent, now_ms: u64) {
        match event {
            NodeEvent::SensorEdge {
                sensor,
                occupied,
                at_ms,
            } => {
                for change in self.detector.on_sensor_edge(sensor, occupied, at_ms) {
                    self.emit(change);
                }
            }
            NodeEvent::Inbound(msg) => {
                if let Ok(Some(cmd)) = self.router.route_inbound(&msg) {
                    self.command(cmd, now_ms);
                }
            }
            NodeEvent::Command(cmd) => self.command(cmd, now_ms),
            NodeEvent::LinkChanged(up) => self.on_link_changed(up, now_ms),
        }
    }

    fn command(&mut self, cmd: AspectCommand, now_ms: u64) {
        match self.controller.set_aspect(cmd.direction, cmd.aspect, now_ms) {
            Ok(()) => self.stats.commands_accepted += 1,
            Err(SignalError::UnsupportedAspect { .. }) => self.stats.rejected_aspects += 1,
            Err(SignalError::OutOfRange(_)) => self.stats.out_of_range_levels += 1,
            Err(err) => debug!("{} signal: command ignored: {err}", cmd.direction),
        }
    }

    /// Request an aspect locally, as if the control authority had sent it.
    ///
    /// The command is queued and applied on the next tick in order with
    /// everything else, so it is the way to set `AllFlash` from code.
    /// Returns false if the queue was full.
    pub fn set_aspect(&mut self, direction: SignalDirection, aspect: Aspect) -> bool {
        self.push_event(NodeEvent::Command(AspectCommand { direction, aspect }))
    }

    fn on_link_changed(&mut self, up: bool, now_ms: u64) {
        self.link_up = up;
        self.controller.on_link_state(up, now_ms);

        if !up {
            warn!("control link lost");
            return;
        }

        info!("control link up, subscribing");
        if let Err(err) = self.router.subscribe_all(&mut self.client) {
            warn!("subscribe failed: {err:?}");
        }
        for publication in self.router.resync() {
            self.router.publish(&mut self.client, &publication);
        }
    }

    fn emit(&mut self, event: OccupancyEvent) {
        match event {
            OccupancyEvent::DirectionAmbiguous => self.stats.ambiguous_directions += 1,
            OccupancyEvent::OccupiedChanged(occupied) => {
                info!("block {}", if occupied { "occupied" } else { "free" });
            }
            _ => {}
        }
        if let Some(publication) = self.router.outbound(&event) {
            self.router.publish(&mut self.client, &publication);
        }
    }

    /// Full reset: signals back to StartUp, block free, queue emptied.
    ///
    /// Sensors last reported occupied are republished as free while the
    /// link is up; a sensor still covered reports again once debounced.
    pub fn reset(&mut self) {
        self.queue.clear();
        for debouncer in self.debouncers.iter_mut() {
            debouncer.reset();
        }
        self.detector.reset();
        self.controller.reset();

        let cleared = self.router.reset();
        if self.link_up {
            for publication in cleared {
                self.router.publish(&mut self.client, &publication);
            }
        }
    }

    /// Counters, including those kept by the router and controller.
    pub fn stats(&self) -> NodeStats {
        let router = self.router.stats();
        NodeStats {
            malformed_messages: router.malformed_messages,
            unknown_topics: router.unknown_topics,
            publish_failures: router.publish_failures,
            published: router.published,
            fail_safe_activations: self.controller.fail_safe_activations(),
            ..self.stats
        }
    }

    /// Snapshot for status reporting.
    pub fn state(&self) -> NodeState {
        NodeState {
            phase: self.controller.phase(),
            sensors: Sensor::BOTH.map(|s| self.detector.sensor(s)),
            occupied: self.detector.is_occupied(),
            direction: self.detector.direction(),
            aspects: SignalDirection::ALL.map(|d| self.controller.aspect(d)),
            link_up: self.link_up,
            fail_safe: self.controller.is_fail_safe(),
            stats: self.stats(),
        }
    }

    /// Configuration the node was built from.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The signal controller.
    pub fn controller(&self) -> &SignalController<L> {
        &self.controller
    }

    /// The occupancy detector.
    pub fn detector(&self) -> &OccupancyDetector {
        &self.detector
    }

    /// The control link client.
    pub fn client(&self) -> &M {
        &self.client
    }

    /// Mutable access to the control link client.
    pub fn client_mut(&mut self) -> &mut M {
        &mut self.client
    }

    /// Mutable access to one sensor.
    pub fn sensor_mut(&mut self, sensor: Sensor) -> &mut S {
        &mut self.sensors[sensor.index()]
    }
}
