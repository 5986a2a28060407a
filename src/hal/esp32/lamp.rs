//! Signal lamp output on an ESP32 LEDC PWM channel.
//!
//! All lamps share one LEDC timer; each lamp takes one channel. The
//! ESP32-C3 has six channels, enough for two signals of three lamps.

use crate::traits::LampOutput;
use esp_idf_hal::gpio::OutputPin;
use esp_idf_hal::ledc::{
    config::TimerConfig, LedcChannel, LedcDriver, LedcTimer, LedcTimerDriver, Resolution,
};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::prelude::*;
use esp_idf_hal::sys::EspError;

/// One signal LED driven by PWM.
///
/// # Example
///
/// ```ignore
/// use rs_blocksig::hal::esp32::Esp32Lamp;
/// use rs_blocksig::traits::LampOutput;
///
/// let peripherals = Peripherals::take()?;
/// let timer = Esp32Lamp::timer(peripherals.ledc.timer0)?;
/// let mut lamp = Esp32Lamp::new(peripherals.ledc.channel0, &timer, peripherals.pins.gpio2)?;
///
/// lamp.set_level(125)?;
/// ```
pub struct Esp32Lamp<'d> {
    pwm: LedcDriver<'d>,
    max_duty: u32,
}

impl<'d> Esp32Lamp<'d> {
    /// PWM frequency in Hz (well above visible flicker)
    const PWM_FREQ_HZ: u32 = 5_000;

    /// 8-bit resolution matches the 0-255 lamp level one to one
    const PWM_RESOLUTION: Resolution = Resolution::Bits8;

    /// Configure the LEDC timer shared by all lamps.
    pub fn timer<T, TI>(timer: T) -> Result<LedcTimerDriver<'d, TI::SpeedMode>, EspError>
    where
        TI: LedcTimer + 'd,
        T: Peripheral<P = TI> + 'd,
    {
        let config = TimerConfig::default()
            .frequency(Self::PWM_FREQ_HZ.Hz())
            .resolution(Self::PWM_RESOLUTION);
        LedcTimerDriver::new(timer, &config)
    }

    /// Attach a lamp to a channel and pin. The lamp starts dark.
    ///
    /// # Errors
    ///
    /// Returns an error if channel initialization fails.
    pub fn new<C, CI, P, PI>(
        channel: C,
        timer: &LedcTimerDriver<'d, CI::SpeedMode>,
        pin: P,
    ) -> Result<Self, EspError>
    where
        CI: LedcChannel + 'd,
        C: Peripheral<P = CI> + 'd,
        PI: OutputPin + 'd,
        P: Peripheral<P = PI> + 'd,
    {
        let mut pwm = LedcDriver::new(channel, timer, pin)?;
        let max_duty = pwm.get_max_duty();
        pwm.set_duty(0)?;
        Ok(Self { pwm, max_duty })
    }
}

impl LampOutput for Esp32Lamp<'_> {
    type Error = EspError;

    fn set_level(&mut self, level: u8) -> Result<(), EspError> {
        let duty = u32::from(level) * self.max_duty / 255;
        self.pwm.set_duty(duty)
    }
}
