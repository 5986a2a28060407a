//! # rs-blocksig
//!
//! A model railway block-signal node: two IR sensors watch one block, two
//! signals (one per travel direction) show aspects commanded by a control
//! authority over MQTT, and occupancy plus direction of travel are reported
//! back on the same link.
//!
//! ## Features
//!
//! - **Hardware abstraction**: Traits for lamp outputs, block sensors and the MQTT link
//! - **Aspect tables**: Every signal type's permitted aspects and lamp patterns
//! - **Lamp animation**: Brightness ceiling, soft fades, slow and fast flashing
//! - **Boot sequence**: Self-test flashing, then Stop until commanded or timed out
//! - **Fail-safe**: Every signal falls to Stop when the control link stays down
//! - **Status LED**: Lit at power-up, blinking while joining WiFi, dark when connected
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `traits` - Hardware and network abstractions
//! - `aspect` - Aspects, signal types and their lamp patterns
//! - `lamp` - Per-lamp brightness, fade and flash animation
//! - `signal` - Signals, boot phases and the fail-safe
//! - `occupancy` - Sensor debouncing, block occupancy and travel direction
//! - `router` - MQTT topic and payload mapping
//! - `node` - Tick-driven event loop tying everything together
//! - `status` - Network status LED
//! - `hal` - Concrete implementations (mock for testing, esp32 for hardware)
//!
//! ## Example
//!
//! ```rust
//! use rs_blocksig::{Aspect, BlockNode, NodePhase, SignalDirection};
//! use rs_blocksig::config::{LampConfig, NodeConfig};
//! use rs_blocksig::hal::{MockLamp, MockMqtt, MockSensor};
//!
//! // One lamp per signal is enough on the bench
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
//! // Boot: the link comes up and the node reports a free block
//! node.tick(0).unwrap();
//! assert_eq!(node.state().phase, NodePhase::InitialSet);
//!
//! // The control authority clears the forward signal
//! node.client_mut().queue_message("mqtt_n/bs-1/forward", "d80");
//! node.client_mut().queue_message("mqtt_n/bs-1/backward", "stop");
//! node.tick(20).unwrap();
//!
//! assert_eq!(node.state().phase, NodePhase::Running);
//! assert_eq!(node.controller().aspect(SignalDirection::Forward), Aspect::Clear);
//! ```

#![warn(missing_docs)]

/// Signal aspects, signal types and the aspect-to-lamp tables.
pub mod aspect;
/// Error type shared by the signal engine.
pub mod error;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Lamp brightness, fading and flashing.
pub mod lamp;
/// The block node event loop.
pub mod node;
/// Sensor debouncing, occupancy and direction detection.
pub mod occupancy;
/// MQTT topic routing and payload mapping.
pub mod router;
/// Signals, boot phases and link supervision.
pub mod signal;
/// Board status indicator.
pub mod status;
/// Core traits for hardware and network abstraction.
pub mod traits;

/// Node configuration for desktop and ESP32.
pub mod config;

/// Host-side MQTT link (feature-gated).
#[cfg(feature = "mqtt")]
pub mod services;

// Re-exports for convenience
pub use aspect::{resolve, Aspect, LampPattern, SignalType};
pub use error::SignalError;
pub use lamp::LampDriver;
pub use node::{BlockNode, NodeEvent, NodeState, NodeStats};
pub use occupancy::{OccupancyDetector, OccupancyEvent, Sensor, TravelDirection};
pub use router::{AspectCommand, MessageRouter, Publication};
pub use signal::{NodePhase, SignalController, SignalDirection};
pub use traits::{
    // Hardware
    Clock,
    LampOutput,
    // Network
    MqttClient,
    MqttMessage,
    SensorInput,
};

// Config re-exports
pub use config::{
    BlockConfig, LampConfig, MqttConfig, NodeConfig, NodeIdentity, RemoteConfig, SignalConfig,
    SignalsConfig, TimingConfig, WifiConfig,
};
