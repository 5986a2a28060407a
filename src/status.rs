//! Board status indicator.
//!
//! One LED shows how far the node got with its network: lit from power-up,
//! blinking while it joins WiFi, dark once connected. It is separate from
//! the signal lamps and ignores the brightness ceiling.
//!
//! ```rust
//! use rs_blocksig::hal::MockLamp;
//! use rs_blocksig::status::{NetworkStatus, StatusLed};
//!
//! let mut led = StatusLed::new(MockLamp::new());
//! led.tick(0).unwrap();
//! assert_eq!(led.output().level, 255);
//!
//! led.set_status(NetworkStatus::Connected);
//! led.tick(20).unwrap();
//! assert_eq!(led.output().level, 0);
//! ```

use crate::lamp::{LampDriver, LAMP_OFF, LAMP_ON};
use crate::traits::LampOutput;

/// Blink period while joining.
pub const JOIN_BLINK_MS: u32 = 500;

/// How far network bring-up has got.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NetworkStatus {
    /// Powered up, no network activity yet.
    #[default]
    Booting,
    /// Joining the WiFi network.
    Connecting,
    /// On the network.
    Connected,
}

/// Drives the status LED from a [`NetworkStatus`].
pub struct StatusLed<L: LampOutput> {
    lamp: LampDriver<L>,
    status: NetworkStatus,
}

impl<L: LampOutput> StatusLed<L> {
    /// Create the indicator, lit.
    pub fn new(output: L) -> Self {
        let mut lamp = LampDriver::new(output, LAMP_ON, LAMP_ON);
        let _ = lamp.set_steady(i32::from(LAMP_ON));
        Self {
            lamp,
            status: NetworkStatus::Booting,
        }
    }

    /// Show a new status from the next tick on.
    pub fn set_status(&mut self, status: NetworkStatus) {
        if status == self.status {
            return;
        }
        self.status = status;
        let _ = match status {
            NetworkStatus::Booting => self.lamp.set_steady(i32::from(LAMP_ON)),
            NetworkStatus::Connecting => {
                self.lamp.set_flashing(JOIN_BLINK_MS);
                Ok(())
            }
            NetworkStatus::Connected => self.lamp.set_steady(i32::from(LAMP_OFF)),
        };
    }

    /// Current status.
    pub fn status(&self) -> NetworkStatus {
        self.status
    }

    /// Advance the blink and write the LED.
    pub fn tick(&mut self, now_ms: u64) -> Result<(), L::Error> {
        self.lamp.tick(now_ms)
    }

    /// The LED output.
    pub fn output(&self) -> &L {
        self.lamp.output()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockLamp;

    #[test]
    fn lit_then_blinking_then_dark() {
        let mut led = StatusLed::new(MockLamp::new());
        led.tick(0).unwrap();
        assert_eq!(led.output().level, 255);

        led.set_status(NetworkStatus::Connecting);
        for t in 1..=100u64 {
            led.tick(t * 20).unwrap();
        }
        // 250 ms on, 250 ms off over two seconds
        let lit_periods = led
            .output()
            .history
            .windows(2)
            .filter(|w| w[0] == 0 && w[1] == 255)
            .count();
        assert_eq!(lit_periods, 3);

        led.set_status(NetworkStatus::Connected);
        led.tick(2_020).unwrap();
        assert_eq!(led.output().level, 0);
        assert_eq!(led.status(), NetworkStatus::Connected);
    }

    #[test]
    fn repeated_status_keeps_blink_phase() {
        let mut led = StatusLed::new(MockLamp::new());
        led.set_status(NetworkStatus::Connecting);
        led.tick(0).unwrap();
        led.tick(260).unwrap();
        assert_eq!(led.output().level, 0);
        led.set_status(NetworkStatus::Connecting);
        led.tick(300).unwrap();
        assert_eq!(led.output().level, 0);
    }
}
