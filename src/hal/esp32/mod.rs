//! ESP32-C3 hardware for a block-signal node.
//!
//! # Hardware Configuration
//!
//! - **MCU**: ESP32-C3 SuperMini
//! - **Lamps**: signal LEDs on LEDC PWM channels, one channel per lamp
//! - **Sensors**: two reflective IR modules (active-low digital output)
//! - **Status**: on-board LED showing network bring-up
//!
//! # Pin Assignments
//!
//! See the [`pins`] module for the default wiring.

mod lamp;
mod sensor;
mod status;

pub use lamp::Esp32Lamp;
pub use sensor::Esp32Sensor;
pub use status::{spawn_status_led, Esp32StatusPin};

#[cfg(feature = "wifi")]
mod wifi;
#[cfg(feature = "wifi")]
pub use wifi::Esp32Wifi;

#[cfg(feature = "esp32-mqtt")]
mod mqtt;
#[cfg(feature = "esp32-mqtt")]
pub use mqtt::{Esp32Mqtt, Esp32MqttError};

/// Default pin assignments for the SuperMini ESP32-C3.
pub mod pins {
    // =========================================================================
    // Signal lamps (LEDC PWM)
    // =========================================================================

    /// Forward signal, lamp 1
    pub const FORWARD_LAMP_1: i32 = 2;

    /// Forward signal, lamp 2
    pub const FORWARD_LAMP_2: i32 = 3;

    /// Backward signal, lamp 1
    pub const BACKWARD_LAMP_1: i32 = 4;

    /// Backward signal, lamp 2
    pub const BACKWARD_LAMP_2: i32 = 5;

    // =========================================================================
    // Block sensors
    // =========================================================================

    /// IR sensor one (single track or up track)
    pub const SENSOR_ONE: i32 = 6;

    /// IR sensor two (down track)
    pub const SENSOR_TWO: i32 = 7;

    /// GPIOs the sensors may be moved to in config
    pub const SENSOR_CAPABLE: [u8; 6] = [0, 1, 6, 7, 9, 10];

    // =========================================================================
    // Status
    // =========================================================================

    /// On-board LED (active-low)
    pub const STATUS_LED: i32 = 8;
}
