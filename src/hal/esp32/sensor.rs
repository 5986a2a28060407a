//! Reflective IR block sensor on an ESP32 GPIO.
//!
//! Common IR obstacle modules pull their output low while they see a train.
//!
//! # Wiring
//!
//! - OUT → GPIO6 (sensor one) / GPIO7 (sensor two)
//! - VCC → 3.3V
//! - GND → GND

use core::convert::Infallible;

use crate::traits::SensorInput;
use esp_idf_hal::gpio::{Input, InputPin, OutputPin, PinDriver, Pull};
use esp_idf_hal::peripheral::Peripheral;

/// One IR sensor input.
///
/// Readings are raw; the node debounces them.
///
/// # Example
///
/// ```ignore
/// use rs_blocksig::hal::esp32::Esp32Sensor;
/// use rs_blocksig::traits::SensorInput;
///
/// let peripherals = Peripherals::take()?;
/// let mut s1 = Esp32Sensor::new(peripherals.pins.gpio6)?;
/// let occupied = s1.is_occupied()?;
/// ```
pub struct Esp32Sensor<'d, P>
where
    P: InputPin + OutputPin,
{
    pin: PinDriver<'d, P, Input>,
    active_low: bool,
}

impl<'d, P> Esp32Sensor<'d, P>
where
    P: InputPin + OutputPin,
{
    /// Creates an active-low sensor with the internal pull-up enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if GPIO initialization fails.
    pub fn new(pin: impl Peripheral<P = P> + 'd) -> Result<Self, esp_idf_hal::sys::EspError> {
        let mut pin = PinDriver::input(pin)?;
        pin.set_pull(Pull::Up)?;
        Ok(Self {
            pin,
            active_low: true,
        })
    }

    /// Treat a high level as occupied instead.
    pub fn active_high(mut self) -> Self {
        self.active_low = false;
        self
    }
}

impl<P> SensorInput for Esp32Sensor<'_, P>
where
    P: InputPin + OutputPin,
{
    type Error = Infallible;

    fn is_occupied(&mut self) -> Result<bool, Infallible> {
        Ok(self.pin.is_low() == self.active_low)
    }
}
