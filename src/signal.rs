//! Signal controller: node phases, aspect application and the link fail-safe.
//!
//! The controller owns both signals of the node and their lamp drivers. It
//! is the only place aspects are changed, and it only changes them in
//! response to commands (via [`set_aspect`](SignalController::set_aspect)),
//! phase transitions or the fail-safe. Occupancy never changes an aspect
//! locally.
//!
//! # Phases
//!
//! ```text
//! StartUp ──self-test done──▶ InitialSet ──all assigned / timeout──▶ Running
//!    ▲                                                                 │
//!    └──────────────────────────── reset() ────────────────────────────┘
//! ```
//!
//! - **StartUp**: every lamp flashes `flash_at_startup` times. Valid commands
//!   are held.
//! - **InitialSet**: every signal shows Stop, then held commands apply.
//! - **Running**: commands apply immediately.
//!
//! # Fail-safe
//!
//! Once the control link has been down for longer than `link_grace_ms` every
//! signal is forced to Stop. Aspects are not restored when the link returns;
//! the control authority has to resend them.

use core::fmt;

use heapless::Deque;
use log::{info, warn};

use crate::aspect::{resolve, Aspect, LampPattern, SignalType};
use crate::config::{NodeConfig, ShortString};
use crate::error::SignalError;
use crate::lamp::{LampDriver, LAMP_OFF, LAMP_ON};
use crate::traits::LampOutput;

/// Maximum lamp outputs per signal.
pub const MAX_LAMPS: usize = 4;

/// Commands held during StartUp.
const MAX_HELD: usize = 8;

/// Which of the node's two signals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SignalDirection {
    /// Governs travel entering over sensor one.
    Forward,
    /// Governs travel entering over sensor two.
    Backward,
}

impl SignalDirection {
    /// Both directions.
    pub const ALL: [SignalDirection; 2] = [SignalDirection::Forward, SignalDirection::Backward];

    /// Array index (0 or 1).
    pub fn index(self) -> usize {
        match self {
            SignalDirection::Forward => 0,
            SignalDirection::Backward => 1,
        }
    }

    /// The other direction.
    pub fn opposite(self) -> SignalDirection {
        match self {
            SignalDirection::Forward => SignalDirection::Backward,
            SignalDirection::Backward => SignalDirection::Forward,
        }
    }
}

impl fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalDirection::Forward => f.write_str("forward"),
            SignalDirection::Backward => f.write_str("backward"),
        }
    }
}

/// Boot sequence phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NodePhase {
    /// Lamp self-test.
    #[default]
    StartUp,
    /// All Stop, waiting for the first aspect of every signal.
    InitialSet,
    /// Normal operation.
    Running,
}

impl NodePhase {
    /// Numeric phase code (Running 0, InitialSet 250, StartUp 255).
    pub fn code(self) -> u8 {
        match self {
            NodePhase::Running => 0,
            NodePhase::InitialSet => 250,
            NodePhase::StartUp => 255,
        }
    }
}

/// Timing the controller needs from [`NodeConfig`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignalTiming {
    /// Self-test cycles (0 = skip).
    pub flash_at_startup: u8,
    /// Even-duty flash for main signals and the self-test, as (on, off).
    pub flash_slow: (u32, u32),
    /// Distant-signal flash, as (on, off).
    pub flash_fast: (u32, u32),
    /// InitialSet fallback.
    pub initial_set_timeout_ms: u32,
    /// Link loss tolerated before the fail-safe.
    pub link_grace_ms: u32,
}

impl From<&NodeConfig> for SignalTiming {
    fn from(config: &NodeConfig) -> Self {
        Self {
            flash_at_startup: config.lamps.flash_at_startup,
            flash_slow: config.lamps.slow_flash(),
            flash_fast: config.lamps.fast_flash(),
            initial_set_timeout_ms: config.timing.initial_set_timeout_ms,
            link_grace_ms: config.timing.link_grace_ms,
        }
    }
}

// ============================================================================
// Signal
// ============================================================================

/// One signal and its lamps.
pub struct Signal<L: LampOutput> {
    id: ShortString,
    signal_type: SignalType,
    aspect: Aspect,
    assigned: bool,
    lamps: heapless::Vec<LampDriver<L>, MAX_LAMPS>,
}

impl<L: LampOutput> Signal<L> {
    /// Command subtopic of this signal.
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Capability class.
    pub fn signal_type(&self) -> SignalType {
        self.signal_type
    }

    /// Aspect currently shown.
    pub fn aspect(&self) -> Aspect {
        self.aspect
    }

    /// Whether an aspect has been received since the last reset.
    pub fn is_assigned(&self) -> bool {
        self.assigned
    }

    /// The signal's lamp drivers.
    pub fn lamps(&self) -> &[LampDriver<L>] {
        &self.lamps
    }

    fn show(&mut self, pattern: LampPattern, timing: &SignalTiming) -> Result<(), SignalError> {
        for lamp in self.lamps.iter_mut() {
            match pattern {
                LampPattern::Off => lamp.set_steady(i32::from(LAMP_OFF))?,
                LampPattern::SteadyOn => lamp.set_steady(i32::from(LAMP_ON))?,
                LampPattern::FlashSlow | LampPattern::AllFlash => {
                    lamp.set_flashing_duty(timing.flash_slow.0, timing.flash_slow.1)
                }
                LampPattern::FlashFast => {
                    lamp.set_flashing_duty(timing.flash_fast.0, timing.flash_fast.1)
                }
            }
        }
        Ok(())
    }

    fn stop(&mut self, timing: &SignalTiming) -> Result<(), SignalError> {
        self.aspect = Aspect::Stop;
        self.show(LampPattern::Off, timing)
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Owns both signals and sequences the node phases.
///
/// # Example
///
/// ```rust
/// use rs_blocksig::config::{LampConfig, NodeConfig};
/// use rs_blocksig::hal::MockLamp;
/// use rs_blocksig::signal::{NodePhase, SignalController, SignalDirection};
/// use rs_blocksig::aspect::Aspect;
///
/// let config = NodeConfig::default()
///     .with_lamps(LampConfig::default().with_flash_at_startup(0));
/// let mut ctrl = SignalController::new(&config, [MockLamp::new()], [MockLamp::new()]);
///
/// ctrl.on_link_state(true, 0);
/// ctrl.tick(0).unwrap();
/// assert_eq!(ctrl.phase(), NodePhase::InitialSet);
///
/// ctrl.set_aspect(SignalDirection::Forward, Aspect::Clear, 20).unwrap();
/// ctrl.set_aspect(SignalDirection::Backward, Aspect::Stop, 20).unwrap();
/// ctrl.tick(20).unwrap();
/// assert_eq!(ctrl.phase(), NodePhase::Running);
/// ```
pub struct SignalController<L: LampOutput> {
    signals: [Signal<L>; 2],
    timing: SignalTiming,
    phase: NodePhase,
    initial_set_since: u64,
    held: Deque<(SignalDirection, Aspect), MAX_HELD>,
    self_test_started: bool,
    link_up: bool,
    link_down_since: Option<u64>,
    fail_safe: bool,
    fail_safe_activations: u32,
}

impl<L: LampOutput> SignalController<L> {
    /// Build both signals from config and their lamp outputs.
    ///
    /// Lamps beyond [`MAX_LAMPS`] per signal are ignored.
    pub fn new(
        config: &NodeConfig,
        forward_lamps: impl IntoIterator<Item = L>,
        backward_lamps: impl IntoIterator<Item = L>,
    ) -> Self {
        let step = config.fade_step();
        let ceiling = config.lamps.brightness;
        let build = |direction: SignalDirection, outputs: &mut dyn Iterator<Item = L>| {
            let signal = config.signals.get(direction);
            let mut lamps = heapless::Vec::new();
            for output in outputs {
                if lamps.push(LampDriver::new(output, ceiling, step)).is_err() {
                    warn!("{direction} signal: more than {MAX_LAMPS} lamps, extra ignored");
                    break;
                }
            }
            Signal {
                id: signal.id.clone(),
                signal_type: signal.signal_type,
                aspect: Aspect::Stop,
                assigned: false,
                lamps,
            }
        };

        let forward = build(SignalDirection::Forward, &mut forward_lamps.into_iter());
        let backward = build(SignalDirection::Backward, &mut backward_lamps.into_iter());

        Self {
            signals: [forward, backward],
            timing: SignalTiming::from(config),
            phase: NodePhase::StartUp,
            initial_set_since: 0,
            held: Deque::new(),
            self_test_started: false,
            link_up: false,
            link_down_since: None,
            fail_safe: false,
            fail_safe_activations: 0,
        }
    }

    /// Request an aspect for one signal.
    ///
    /// Unsupported aspects are rejected and the signal keeps what it shows.
    /// During StartUp valid commands are held until InitialSet.
    pub fn set_aspect(
        &mut self,
        direction: SignalDirection,
        aspect: Aspect,
        now_ms: u64,
    ) -> Result<(), SignalError> {
        let signal_type = self.signals[direction.index()].signal_type;
        let pattern = resolve(signal_type, aspect).inspect_err(|err| {
            warn!("{direction} signal: {err}");
        })?;

        if self.phase == NodePhase::StartUp {
            if self.held.is_full() {
                self.held.pop_front();
            }
            let _ = self.held.push_back((direction, aspect));
            return Ok(());
        }

        self.apply(direction, aspect, pattern)?;
        if self.phase == NodePhase::InitialSet {
            self.try_finish_initial_set(now_ms);
        }
        Ok(())
    }

    fn apply(
        &mut self,
        direction: SignalDirection,
        aspect: Aspect,
        pattern: LampPattern,
    ) -> Result<(), SignalError> {
        let timing = self.timing;

        if pattern == LampPattern::AllFlash {
            for signal in self.signals.iter_mut().filter(|s| s.signal_type.is_used()) {
                signal.aspect = Aspect::AllFlash;
                signal.show(LampPattern::AllFlash, &timing)?;
            }
            self.signals[direction.index()].assigned = true;
            info!("all-flash override set from {direction} signal");
            return Ok(());
        }

        let other = &mut self.signals[direction.opposite().index()];
        if other.aspect == Aspect::AllFlash {
            other.stop(&timing)?;
            info!("all-flash override cleared");
        }

        let signal = &mut self.signals[direction.index()];
        if signal.aspect != aspect {
            info!("{direction} signal: {} -> {aspect}", signal.aspect);
        }
        signal.aspect = aspect;
        signal.assigned = true;
        signal.show(pattern, &timing)
    }

    /// Report the control link state.
    pub fn on_link_state(&mut self, up: bool, now_ms: u64) {
        if up == self.link_up && (up || self.link_down_since.is_some()) {
            return;
        }
        self.link_up = up;
        if up {
            self.link_down_since = None;
            if self.fail_safe {
                self.fail_safe = false;
                info!("control link restored, waiting for new aspects");
            }
        } else {
            self.link_down_since = Some(now_ms);
        }
    }

    /// Advance phases, supervise the link and animate every lamp.
    ///
    /// Lamp write errors propagate unchanged; state has already advanced.
    pub fn tick(&mut self, now_ms: u64) -> Result<(), L::Error> {
        if !self.link_up && self.link_down_since.is_none() {
            self.link_down_since = Some(now_ms);
        }
        self.supervise_link(now_ms);

        if self.phase == NodePhase::StartUp && !self.self_test_started {
            self.start_self_test();
        }

        for signal in self.signals.iter_mut() {
            for lamp in signal.lamps.iter_mut() {
                lamp.tick(now_ms)?;
            }
        }

        if self.phase == NodePhase::StartUp && self.self_test_done() {
            self.enter_initial_set(now_ms);
        }
        if self.phase == NodePhase::InitialSet {
            self.try_finish_initial_set(now_ms);
        }
        Ok(())
    }

    fn supervise_link(&mut self, now_ms: u64) {
        let Some(since) = self.link_down_since else {
            return;
        };
        if self.fail_safe || now_ms.saturating_sub(since) <= u64::from(self.timing.link_grace_ms) {
            return;
        }

        self.fail_safe = true;
        self.fail_safe_activations += 1;
        warn!(
            "control link down for more than {} ms, forcing all signals to stop",
            self.timing.link_grace_ms
        );
        if self.phase == NodePhase::StartUp {
            self.held.clear();
        } else {
            self.force_stop();
        }
    }

    /// Self-test cycles to run; none without a flash period to run them at.
    fn self_test_cycles(&self) -> u8 {
        let (on_ms, off_ms) = self.timing.flash_slow;
        if on_ms == 0 || off_ms == 0 {
            0
        } else {
            self.timing.flash_at_startup
        }
    }

    fn start_self_test(&mut self) {
        self.self_test_started = true;
        if self.self_test_cycles() == 0 {
            if self.timing.flash_at_startup > 0 {
                warn!("lamp self-test skipped: flash period is 0");
            }
            return;
        }
        info!("lamp self-test: {} flashes", self.timing.flash_at_startup);
        let (on_ms, off_ms) = self.timing.flash_slow;
        for signal in self.signals.iter_mut() {
            for lamp in signal.lamps.iter_mut() {
                lamp.set_flashing_duty(on_ms, off_ms);
            }
        }
    }

    fn self_test_done(&self) -> bool {
        let cycles = u32::from(self.self_test_cycles());
        self.signals
            .iter()
            .flat_map(|s| s.lamps.iter())
            .all(|lamp| lamp.flash_cycles() >= cycles)
    }

    fn enter_initial_set(&mut self, now_ms: u64) {
        self.phase = NodePhase::InitialSet;
        self.initial_set_since = now_ms;
        info!("phase: start-up -> initial set");
        self.force_stop();

        while let Some((direction, aspect)) = self.held.pop_front() {
            let signal_type = self.signals[direction.index()].signal_type;
            if let Ok(pattern) = resolve(signal_type, aspect) {
                let _ = self.apply(direction, aspect, pattern);
            }
        }
    }

    fn try_finish_initial_set(&mut self, now_ms: u64) {
        let all_assigned = self
            .signals
            .iter()
            .filter(|s| s.signal_type.is_used())
            .all(|s| s.assigned);
        let timed_out = now_ms.saturating_sub(self.initial_set_since)
            >= u64::from(self.timing.initial_set_timeout_ms);

        if all_assigned || timed_out {
            self.phase = NodePhase::Running;
            if all_assigned {
                info!("phase: initial set -> running");
            } else {
                warn!("phase: initial set -> running after timeout, unset signals stay at stop");
            }
        }
    }

    fn force_stop(&mut self) {
        let timing = self.timing;
        for signal in self.signals.iter_mut() {
            // Off is always in range
            let _ = signal.stop(&timing);
        }
    }

    /// Full reset back to StartUp. Link state is kept.
    pub fn reset(&mut self) {
        info!("controller reset");
        self.held.clear();
        self.force_stop();
        for signal in self.signals.iter_mut() {
            signal.assigned = false;
        }
        self.phase = NodePhase::StartUp;
        self.self_test_started = false;
        self.fail_safe = false;
        if !self.link_up {
            self.link_down_since = None;
        }
    }

    /// Current phase.
    pub fn phase(&self) -> NodePhase {
        self.phase
    }

    /// One signal.
    pub fn signal(&self, direction: SignalDirection) -> &Signal<L> {
        &self.signals[direction.index()]
    }

    /// Aspect shown by one signal.
    pub fn aspect(&self, direction: SignalDirection) -> Aspect {
        self.signals[direction.index()].aspect
    }

    /// Direction whose signal listens on `id`.
    pub fn direction_for_id(&self, id: &str) -> Option<SignalDirection> {
        SignalDirection::ALL
            .into_iter()
            .find(|d| self.signals[d.index()].id.as_str() == id)
    }

    /// Whether the fail-safe currently holds every signal at Stop.
    pub fn is_fail_safe(&self) -> bool {
        self.fail_safe
    }

    /// Times the fail-safe has engaged.
    pub fn fail_safe_activations(&self) -> u32 {
        self.fail_safe_activations
    }

    /// Last reported link state.
    pub fn link_up(&self) -> bool {
        self.link_up
    }
}
