//! Lamp driver: steady, fading and flashing control of one signal lamp.
//!
//! A [`LampDriver`] owns one [`LampOutput`] and animates it from the node's
//! periodic tick. It knows nothing about aspects; the
//! [`SignalController`](crate::signal::SignalController) translates aspects
//! into driver calls.
//!
//! # Fading
//!
//! [`set_steady`](LampDriver::set_steady) eases the level toward the target
//! by a fixed step per tick, so a full OFF→ON change always takes
//! [`ticks_for_full_transition`](LampDriver::ticks_for_full_transition)
//! ticks and the level never leaves 0–255.
//!
//! # Flashing
//!
//! While flashing the level jumps between full ON and full OFF on the
//! phase boundaries. Easing is skipped so flash timing stays exact. Flash
//! rates are configured as full periods; [`split_period`] turns a period and
//! a duty fraction into on and off times, which the 3:5 distant-signal flash
//! needs.
//!
//! # Example
//!
//! ```rust
//! use rs_blocksig::lamp::{LampDriver, LAMP_ON};
//! use rs_blocksig::hal::MockLamp;
//!
//! let mut lamp = LampDriver::new(MockLamp::new(), 255, 85);
//! lamp.set_steady(LAMP_ON as i32).unwrap();
//!
//! for tick in 1..=3 {
//!     lamp.tick(tick * 20).unwrap();
//! }
//! assert_eq!(lamp.brightness(), LAMP_ON);
//! assert_eq!(lamp.output().level, 255);
//! ```

use crate::error::SignalError;
use crate::traits::LampOutput;

/// Full ON level.
pub const LAMP_ON: u8 = 255;
/// Full OFF level.
pub const LAMP_OFF: u8 = 0;

/// Step size for a full OFF↔ON fade lasting `fade_ms` at a `tick_ms` cadence.
///
/// Always at least 1 and at most 255 (an instant change in one tick).
pub fn fade_step(tick_ms: u32, fade_ms: u32) -> u8 {
    let ticks = if tick_ms == 0 {
        1
    } else {
        (fade_ms / tick_ms).max(1)
    };
    let step = (u32::from(LAMP_ON) + ticks - 1) / ticks;
    step.clamp(1, u32::from(LAMP_ON)) as u8
}

/// On and off times for a flash lit for `on_parts` of every `parts` of `period_ms`.
///
/// The two times add up to the period. A period of 0 gives `(0, 0)`
/// (steady). Both phases are at least 1 ms, so a 1 ms period becomes 2 ms.
pub fn split_period(period_ms: u32, on_parts: u32, parts: u32) -> (u32, u32) {
    if period_ms == 0 {
        return (0, 0);
    }
    let on = (u64::from(period_ms) * u64::from(on_parts) / u64::from(parts.max(1))) as u32;
    let on = on.clamp(1, period_ms.saturating_sub(1).max(1));
    (on, period_ms.saturating_sub(on).max(1))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Flash {
    on_ms: u32,
    off_ms: u32,
    phase_on: bool,
    next_toggle_ms: Option<u64>,
    cycles: u32,
}

/// Animated driver for one lamp output.
pub struct LampDriver<L: LampOutput> {
    output: L,
    brightness: u8,
    target: u8,
    step: u8,
    ceiling: u8,
    flash: Option<Flash>,
    last_tick_ms: Option<u64>,
}

impl<L: LampOutput> LampDriver<L> {
    /// Create a dark lamp.
    ///
    /// `ceiling` is the LED brightness limit applied to the output (the
    /// logical level 255 is written as `ceiling`). `step` is the fade step
    /// per tick, see [`fade_step`].
    pub fn new(output: L, ceiling: u8, step: u8) -> Self {
        Self {
            output,
            brightness: LAMP_OFF,
            target: LAMP_OFF,
            step: step.max(1),
            ceiling,
            flash: None,
            last_tick_ms: None,
        }
    }

    /// Fade toward a steady level and stop any flashing.
    ///
    /// Levels outside 0–255 are rejected with [`SignalError::OutOfRange`]
    /// and the lamp keeps its previous setting.
    pub fn set_steady(&mut self, level: i32) -> Result<(), SignalError> {
        let level = u8::try_from(level).map_err(|_| SignalError::OutOfRange(level))?;
        self.flash = None;
        self.target = level;
        Ok(())
    }

    /// Flash with an even duty cycle over a full `period_ms`.
    ///
    /// A period of 0 means steady: the lamp fades to full ON instead.
    pub fn set_flashing(&mut self, period_ms: u32) {
        let (on_ms, off_ms) = split_period(period_ms, 1, 2);
        self.set_flashing_duty(on_ms, off_ms);
    }

    /// Flash with separate on and off times.
    ///
    /// Re-issuing the timing that is already running keeps the current
    /// phase, so repeated commands do not restart the flash.
    pub fn set_flashing_duty(&mut self, on_ms: u32, off_ms: u32) {
        if on_ms == 0 || off_ms == 0 {
            self.flash = None;
            self.target = LAMP_ON;
            return;
        }
        if let Some(flash) = &self.flash {
            if flash.on_ms == on_ms && flash.off_ms == off_ms {
                return;
            }
        }
        self.flash = Some(Flash {
            on_ms,
            off_ms,
            phase_on: true,
            next_toggle_ms: None,
            cycles: 0,
        });
    }

    /// Advance the animation and write the output.
    ///
    /// Calling again with the same (or an earlier) time does nothing.
    pub fn tick(&mut self, now_ms: u64) -> Result<(), L::Error> {
        if let Some(last) = self.last_tick_ms {
            if now_ms <= last {
                return Ok(());
            }
        }
        self.last_tick_ms = Some(now_ms);

        if let Some(flash) = self.flash.as_mut() {
            match flash.next_toggle_ms {
                None => {
                    flash.phase_on = true;
                    flash.next_toggle_ms = Some(now_ms + u64::from(flash.on_ms));
                }
                Some(due) if now_ms >= due => {
                    flash.phase_on = !flash.phase_on;
                    let span = if flash.phase_on {
                        flash.on_ms
                    } else {
                        flash.cycles += 1;
                        flash.off_ms
                    };
                    let next = due + u64::from(span);
                    // Resynchronise after a stall longer than one phase.
                    flash.next_toggle_ms = Some(if next <= now_ms {
                        now_ms + u64::from(span)
                    } else {
                        next
                    });
                }
                Some(_) => {}
            }
            self.target = if flash.phase_on { LAMP_ON } else { LAMP_OFF };
            self.brightness = self.target;
        } else if self.brightness < self.target {
            self.brightness = self.brightness.saturating_add(self.step).min(self.target);
        } else if self.brightness > self.target {
            self.brightness = self.brightness.saturating_sub(self.step).max(self.target);
        }

        self.output.set_level(self.scaled())
    }

    fn scaled(&self) -> u8 {
        (u16::from(self.brightness) * u16::from(self.ceiling) / u16::from(LAMP_ON)) as u8
    }

    /// Current logical level (0–255, before the brightness ceiling).
    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Level the lamp is fading toward.
    pub fn target(&self) -> u8 {
        self.target
    }

    /// Whether a flash pattern is active.
    pub fn is_flashing(&self) -> bool {
        self.flash.is_some()
    }

    /// On/off times of the active flash, if any.
    pub fn flash_timing(&self) -> Option<(u32, u32)> {
        self.flash.map(|f| (f.on_ms, f.off_ms))
    }

    /// Whether the flash is currently in its lit phase.
    pub fn flash_phase_on(&self) -> bool {
        self.flash.map(|f| f.phase_on).unwrap_or(false)
    }

    /// Completed ON→OFF cycles since the current flash started.
    pub fn flash_cycles(&self) -> u32 {
        self.flash.map(|f| f.cycles).unwrap_or(0)
    }

    /// Whether the lamp has reached its steady target.
    pub fn is_settled(&self) -> bool {
        self.flash.is_none() && self.brightness == self.target
    }

    /// Upper bound on ticks for a full OFF↔ON fade.
    pub fn ticks_for_full_transition(&self) -> u32 {
        let step = u32::from(self.step);
        (u32::from(LAMP_ON) + step - 1) / step
    }

    /// Brightness ceiling applied to the output.
    pub fn ceiling(&self) -> u8 {
        self.ceiling
    }

    /// The underlying output.
    pub fn output(&self) -> &L {
        &self.output
    }

    /// Mutable access to the underlying output.
    pub fn output_mut(&mut self) -> &mut L {
        &mut self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockLamp;

    fn lamp(step: u8) -> LampDriver<MockLamp> {
        LampDriver::new(MockLamp::new(), 255, step)
    }

    #[test]
    fn fade_step_from_timing() {
        assert_eq!(fade_step(20, 60), 85);
        assert_eq!(fade_step(20, 40), 128);
        assert_eq!(fade_step(20, 0), 255);
        assert_eq!(fade_step(0, 100), 255);
        assert_eq!(fade_step(10, 10_000), 1);
    }

    #[test]
    fn full_on_takes_bounded_ticks() {
        let mut lamp = lamp(127);
        lamp.set_steady(255).unwrap();
        let bound = lamp.ticks_for_full_transition();
        assert_eq!(bound, 3);

        let mut ticks = 0;
        let mut now = 0;
        while lamp.brightness() != 255 {
            now += 20;
            lamp.tick(now).unwrap();
            ticks += 1;
            assert!(ticks <= bound);
        }
        assert_eq!(ticks, bound);
        assert_eq!(lamp.output().history, vec![127, 254, 255]);
    }

    #[test]
    fn fade_down_never_undershoots() {
        let mut lamp = lamp(100);
        lamp.set_steady(255).unwrap();
        for t in 1..=5 {
            lamp.tick(t * 20).unwrap();
        }
        lamp.set_steady(0).unwrap();
        for t in 6..=10 {
            lamp.tick(t * 20).unwrap();
        }
        assert_eq!(lamp.brightness(), 0);
        assert!(lamp.output().history.ends_with(&[155, 55, 0, 0, 0]));
    }

    #[test]
    fn out_of_range_rejected_and_previous_kept() {
        let mut lamp = lamp(255);
        lamp.set_steady(200).unwrap();
        assert_eq!(lamp.set_steady(256), Err(SignalError::OutOfRange(256)));
        assert_eq!(lamp.set_steady(-1), Err(SignalError::OutOfRange(-1)));
        assert_eq!(lamp.target(), 200);
        lamp.tick(20).unwrap();
        assert_eq!(lamp.brightness(), 200);
    }

    #[test]
    fn tick_idempotent_without_clock_advance() {
        let mut lamp = lamp(85);
        lamp.set_steady(255).unwrap();
        lamp.tick(20).unwrap();
        lamp.tick(20).unwrap();
        lamp.tick(10).unwrap();
        assert_eq!(lamp.brightness(), 85);
        assert_eq!(lamp.output().write_count, 1);
    }

    #[test]
    fn ceiling_scales_output() {
        let mut lamp = LampDriver::new(MockLamp::new(), 125, 255);
        lamp.set_steady(255).unwrap();
        lamp.tick(20).unwrap();
        assert_eq!(lamp.brightness(), 255);
        assert_eq!(lamp.output().level, 125);
    }

    #[test]
    fn period_split() {
        assert_eq!(split_period(400, 1, 2), (200, 200));
        assert_eq!(split_period(800, 3, 8), (300, 500));
        let (on, off) = split_period(300, 3, 8);
        assert_eq!((on, off), (112, 188));
        assert_eq!(on + off, 300);
        assert_eq!(split_period(0, 1, 2), (0, 0));
        assert_eq!(split_period(1, 1, 2), (1, 1));
        let (on, off) = split_period(u32::MAX, 3, 8);
        assert_eq!(on, 1_610_612_735);
        assert_eq!(u64::from(on) + u64::from(off), u64::from(u32::MAX));
    }

    #[test]
    fn even_flash_timing() {
        let mut lamp = lamp(1);
        lamp.set_flashing(400);
        assert_eq!(lamp.flash_timing(), Some((200, 200)));

        let mut lit = 0;
        let mut dark = 0;
        // 10 ms ticks over four full periods
        for t in 0..160u64 {
            lamp.tick(t * 10).unwrap();
            if lamp.brightness() == LAMP_ON {
                lit += 1;
            } else {
                assert_eq!(lamp.brightness(), LAMP_OFF);
                dark += 1;
            }
        }
        assert_eq!(lit, dark);
        assert_eq!(lamp.flash_cycles(), 4);
    }

    #[test]
    fn fast_flash_three_to_five_duty() {
        let mut lamp = lamp(1);
        lamp.set_flashing_duty(300, 500);

        let mut lit = 0;
        let mut dark = 0;
        // 10 ms ticks over five 800 ms periods
        for t in 0..400u64 {
            lamp.tick(t * 10).unwrap();
            if lamp.flash_phase_on() {
                lit += 1;
            } else {
                dark += 1;
            }
        }
        assert_eq!(lit * 5, dark * 3);
    }

    #[test]
    fn flash_jumps_without_easing() {
        let mut lamp = lamp(1);
        lamp.set_flashing(200);
        lamp.tick(0).unwrap();
        assert_eq!(lamp.brightness(), 255);
        lamp.tick(100).unwrap();
        assert_eq!(lamp.brightness(), 0);
        lamp.tick(200).unwrap();
        assert_eq!(lamp.brightness(), 255);
    }

    #[test]
    fn repeated_flash_command_keeps_phase() {
        let mut lamp = lamp(1);
        lamp.set_flashing(200);
        lamp.tick(0).unwrap();
        lamp.tick(100).unwrap();
        assert!(!lamp.flash_phase_on());
        lamp.set_flashing(200);
        lamp.tick(150).unwrap();
        assert!(!lamp.flash_phase_on());
        assert_eq!(lamp.flash_cycles(), 1);
    }

    #[test]
    fn flash_resyncs_after_stall() {
        let mut lamp = lamp(1);
        lamp.set_flashing(200);
        lamp.tick(0).unwrap();
        lamp.tick(1_000).unwrap();
        assert!(!lamp.flash_phase_on());
        lamp.tick(1_050).unwrap();
        assert!(!lamp.flash_phase_on());
        lamp.tick(1_100).unwrap();
        assert!(lamp.flash_phase_on());
    }

    #[test]
    fn steady_clears_flash() {
        let mut lamp = lamp(255);
        lamp.set_flashing(100);
        lamp.tick(0).unwrap();
        lamp.set_steady(0).unwrap();
        assert!(!lamp.is_flashing());
        lamp.tick(20).unwrap();
        assert_eq!(lamp.brightness(), 0);
        assert!(lamp.is_settled());
    }

    #[test]
    fn zero_period_means_steady_on() {
        let mut lamp = lamp(255);
        lamp.set_flashing(0);
        assert!(!lamp.is_flashing());
        lamp.tick(20).unwrap();
        assert_eq!(lamp.brightness(), 255);
    }
}
