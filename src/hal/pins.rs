//! GPIOs handed out by number.
//!
//! Sensor pins come from [`BlockConfig`](crate::config::BlockConfig) as plain
//! numbers. A [`PinBank`] holds the free pins of a board and gives each one
//! out at most once, so a config that names a missing or already used pin
//! fails at boot instead of silently reading the wrong input.
//!
//! ```rust
//! use rs_blocksig::hal::{PinBank, PinError};
//!
//! let mut bank = PinBank::new([(6, "gpio6"), (7, "gpio7")]);
//! assert_eq!(bank.take(7), Ok("gpio7"));
//! assert_eq!(bank.take(7), Err(PinError::InUse(7)));
//! assert_eq!(bank.take(12), Err(PinError::Unavailable(12)));
//! ```

/// Why a pin could not be handed out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PinError {
    /// The board has no free pin with this number.
    #[error("GPIO{0} is not available")]
    Unavailable(u8),
    /// The pin was already taken.
    #[error("GPIO{0} is already in use")]
    InUse(u8),
}

/// A fixed set of free pins, keyed by GPIO number.
pub struct PinBank<P, const N: usize> {
    slots: [(u8, Option<P>); N],
}

impl<P, const N: usize> PinBank<P, N> {
    /// Create a bank from `(gpio, pin)` pairs.
    pub fn new(pins: [(u8, P); N]) -> Self {
        Self {
            slots: pins.map(|(gpio, pin)| (gpio, Some(pin))),
        }
    }

    /// Take the pin with this GPIO number.
    pub fn take(&mut self, gpio: u8) -> Result<P, PinError> {
        let slot = self
            .slots
            .iter_mut()
            .find(|(number, _)| *number == gpio)
            .ok_or(PinError::Unavailable(gpio))?;
        slot.1.take().ok_or(PinError::InUse(gpio))
    }

    /// GPIO numbers still free.
    pub fn free(&self) -> impl Iterator<Item = u8> + '_ {
        self.slots
            .iter()
            .filter(|(_, pin)| pin.is_some())
            .map(|(gpio, _)| *gpio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlockConfig;

    fn bank() -> PinBank<&'static str, 4> {
        PinBank::new([(0, "gpio0"), (1, "gpio1"), (6, "gpio6"), (7, "gpio7")])
    }

    #[test]
    fn configured_sensor_pins_are_taken() {
        let block = BlockConfig::default().with_pins(1, 6);
        let mut bank = bank();
        assert_eq!(bank.take(block.sensor_one_pin), Ok("gpio1"));
        assert_eq!(bank.take(block.sensor_two_pin), Ok("gpio6"));
        assert_eq!(bank.free().collect::<Vec<_>>(), vec![0, 7]);
    }

    #[test]
    fn same_pin_twice_is_refused() {
        let block = BlockConfig::default().with_pins(6, 6);
        let mut bank = bank();
        assert!(bank.take(block.sensor_one_pin).is_ok());
        assert_eq!(bank.take(block.sensor_two_pin), Err(PinError::InUse(6)));
    }

    #[test]
    fn unknown_pin_is_refused() {
        let mut bank = bank();
        let err = bank.take(21).unwrap_err();
        assert_eq!(err, PinError::Unavailable(21));
        assert_eq!(err.to_string(), "GPIO21 is not available");
    }
}
