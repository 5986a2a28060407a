//! On-board status LED of the SuperMini (GPIO8, active-low).
//!
//! The LED runs on its own thread so it keeps blinking while WiFi bring-up
//! blocks the main task.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use crate::hal::StdClock;
use crate::status::{NetworkStatus, StatusLed};
use crate::traits::{Clock, LampOutput};
use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};
use esp_idf_hal::sys::EspError;
use log::{debug, warn};

/// Refresh interval of the LED thread.
const STATUS_TICK: Duration = Duration::from_millis(20);

/// A plain GPIO LED: any level above zero is on.
pub struct Esp32StatusPin {
    pin: PinDriver<'static, AnyOutputPin, Output>,
}

impl Esp32StatusPin {
    /// Take the LED pin.
    pub fn new(pin: AnyOutputPin) -> Result<Self, EspError> {
        Ok(Self {
            pin: PinDriver::output(pin)?,
        })
    }
}

impl LampOutput for Esp32StatusPin {
    type Error = EspError;

    fn set_level(&mut self, level: u8) -> Result<(), EspError> {
        if level > 0 {
            self.pin.set_low()
        } else {
            self.pin.set_high()
        }
    }
}

/// Start the LED thread. Send statuses to the returned channel; the thread
/// ends when every sender is dropped.
pub fn spawn_status_led(pin: Esp32StatusPin) -> std::io::Result<Sender<NetworkStatus>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("status-led".into())
        .stack_size(3 * 1024)
        .spawn(move || {
            let clock = StdClock::new();
            let mut led = StatusLed::new(pin);
            loop {
                match rx.recv_timeout(STATUS_TICK) {
                    Ok(status) => {
                        debug!("status LED: {status:?}");
                        led.set_status(status);
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
                if let Err(err) = led.tick(clock.now_ms()) {
                    warn!("status LED write failed: {err}");
                }
            }
        })?;
    Ok(tx)
}
