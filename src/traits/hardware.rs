//! Hardware abstraction traits for lamp outputs, block sensors and time.
//!
//! These traits let the engine run unchanged on an ESP32 and on a desktop
//! with mocks.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`LampOutput`] | One dimmable signal lamp (LED) |
//! | [`SensorInput`] | One raw IR occupancy sensor |
//! | [`Clock`] | Monotonic millisecond time source |
//!
//! # Example
//!
//! ```rust
//! use rs_blocksig::traits::{LampOutput, SensorInput};
//! use rs_blocksig::hal::{MockLamp, MockSensor};
//!
//! let mut lamp = MockLamp::new();
//! lamp.set_level(125).unwrap();
//! assert_eq!(lamp.level, 125);
//!
//! let mut sensor = MockSensor::new();
//! sensor.set_occupied(true);
//! assert!(sensor.is_occupied().unwrap());
//! ```

/// One physical signal lamp.
///
/// The level is the final output intensity (0 = dark, 255 = full). The
/// [`LampDriver`](crate::lamp::LampDriver) has already applied fading,
/// flashing and the brightness ceiling before calling this.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use rs_blocksig::traits::LampOutput;
///
/// struct PwmLamp { /* LEDC channel */ }
///
/// impl LampOutput for PwmLamp {
///     type Error = ();
///
///     fn set_level(&mut self, level: u8) -> Result<(), ()> {
///         // Scale to the PWM resolution and set the duty cycle...
///         Ok(())
///     }
/// }
/// ```
pub trait LampOutput {
    /// Error type for output writes.
    type Error;

    /// Write the output level.
    fn set_level(&mut self, level: u8) -> Result<(), Self::Error>;

    /// Convenience method to switch the lamp dark.
    fn off(&mut self) -> Result<(), Self::Error> {
        self.set_level(0)
    }
}

/// One raw infrared block sensor.
///
/// Readings are not debounced; the node samples every tick and runs them
/// through a [`Debouncer`](crate::occupancy::Debouncer).
pub trait SensorInput {
    /// Error type for sensor reads.
    type Error;

    /// Returns true when the sensor currently sees a train.
    fn is_occupied(&mut self) -> Result<bool, Self::Error>;
}

/// Time source.
///
/// Provides monotonic time in milliseconds for debounce windows, flash
/// timing and phase timeouts.
///
/// # Example
///
/// ```rust
/// use rs_blocksig::traits::Clock;
/// use rs_blocksig::hal::MockClock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.advance(20);
/// assert_eq!(clock.now_ms(), 20);
/// ```
pub trait Clock {
    /// Returns current time in milliseconds since an arbitrary epoch.
    ///
    /// Must be monotonically increasing.
    fn now_ms(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingLamp {
        writes: Vec<u8>,
    }

    impl LampOutput for RecordingLamp {
        type Error = ();

        fn set_level(&mut self, level: u8) -> Result<(), ()> {
            self.writes.push(level);
            Ok(())
        }
    }

    #[test]
    fn lamp_output_off_default_impl() {
        let mut lamp = RecordingLamp { writes: Vec::new() };
        lamp.set_level(200).unwrap();
        lamp.off().unwrap();
        assert_eq!(lamp.writes, vec![200, 0]);
    }

    struct FailingSensor;

    impl SensorInput for FailingSensor {
        type Error = &'static str;

        fn is_occupied(&mut self) -> Result<bool, &'static str> {
            Err("bus error")
        }
    }

    #[test]
    fn sensor_errors_propagate() {
        let mut sensor = FailingSensor;
        assert_eq!(sensor.is_occupied(), Err("bus error"));
    }
}
