//! Signal aspects, signal types and the aspect resolver.
//!
//! Every serialization of an aspect (numeric code, wire token) and of a
//! signal type (numeric code, display name) lives in one table per enum,
//! so the encodings cannot drift apart.
//!
//! # Capability table
//!
//! | Type | Permitted aspects |
//! |------|-------------------|
//! | Hsi2 | Stop, Clear |
//! | Hsi3 | Stop, Clear, Caution |
//! | Hsi4 | Stop, Clear, Caution, ClearWithStop, ClearWithClear |
//! | Hsi5 | all seven, including ShortRoute and ClearWithCaution |
//! | Fsi2 | ClearWithStop, ClearWithClear |
//! | Fsi3 | ClearWithStop, ClearWithClear, ClearWithCaution |
//! | NotUsed | none |
//!
//! [`Aspect::AllFlash`] is an override rather than a displayed aspect and is
//! accepted by every type except [`SignalType::NotUsed`].
//!
//! # Example
//!
//! ```rust
//! use rs_blocksig::aspect::{resolve, Aspect, LampPattern, SignalType};
//!
//! assert_eq!(resolve(SignalType::Hsi5, Aspect::ShortRoute), Ok(LampPattern::SteadyOn));
//! assert!(resolve(SignalType::Hsi2, Aspect::Caution).is_err());
//!
//! assert_eq!(Aspect::from_wire("d80wstop"), Some(Aspect::ClearWithStop));
//! assert_eq!(Aspect::ClearWithStop.code(), 3);
//! ```

use core::fmt;

use crate::error::SignalError;

/// Displayed meaning of a signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Aspect {
    /// Stop (`stop`).
    #[default]
    Stop,
    /// Clear, 80 km/h (`d80`).
    Clear,
    /// Caution, 40 km/h (`d40`).
    Caution,
    /// Clear, expect stop at next signal (`d80wstop`).
    ClearWithStop,
    /// Clear, expect clear at next signal (`d80wd80`).
    ClearWithClear,
    /// Clear, expect caution at next signal (`d80wd40`).
    ClearWithCaution,
    /// Caution into a short route (`d40short`).
    ShortRoute,
    /// Every lamp flashes; fault or override indication.
    AllFlash,
}

/// (aspect, numeric code, wire token)
const ASPECT_TABLE: [(Aspect, u8, Option<&str>); 8] = [
    (Aspect::Stop, 0, Some("stop")),
    (Aspect::Clear, 1, Some("d80")),
    (Aspect::Caution, 2, Some("d40")),
    (Aspect::ClearWithStop, 3, Some("d80wstop")),
    (Aspect::ClearWithClear, 4, Some("d80wd80")),
    (Aspect::ClearWithCaution, 5, Some("d80wd40")),
    (Aspect::ShortRoute, 6, Some("d40short")),
    (Aspect::AllFlash, 255, None),
];

impl Aspect {
    /// All aspects in code order.
    pub const ALL: [Aspect; 8] = [
        Aspect::Stop,
        Aspect::Clear,
        Aspect::Caution,
        Aspect::ClearWithStop,
        Aspect::ClearWithClear,
        Aspect::ClearWithCaution,
        Aspect::ShortRoute,
        Aspect::AllFlash,
    ];

    fn entry(self) -> (Aspect, u8, Option<&'static str>) {
        ASPECT_TABLE[self as usize]
    }

    /// Numeric aspect code (`AllFlash` = 255).
    pub fn code(self) -> u8 {
        self.entry().1
    }

    /// Wire token used on aspect command topics. `AllFlash` has none.
    pub fn wire_token(self) -> Option<&'static str> {
        self.entry().2
    }

    /// Parse a wire token. Case-sensitive, surrounding whitespace ignored.
    pub fn from_wire(token: &str) -> Option<Self> {
        let token = token.trim();
        ASPECT_TABLE
            .iter()
            .find(|(_, _, wire)| *wire == Some(token))
            .map(|(aspect, _, _)| *aspect)
    }

    /// Look up an aspect by numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        ASPECT_TABLE
            .iter()
            .find(|(_, c, _)| *c == code)
            .map(|(aspect, _, _)| *aspect)
    }

    /// Parse a command payload: a wire token or a numeric code.
    ///
    /// Numeric codes are the only way to request `AllFlash` over the link.
    pub fn from_payload(payload: &str) -> Option<Self> {
        Self::from_wire(payload).or_else(|| {
            payload
                .trim()
                .parse::<u8>()
                .ok()
                .and_then(Self::from_code)
        })
    }

    /// Short name for logs and displays.
    pub fn as_str(self) -> &'static str {
        self.wire_token().unwrap_or("allflash")
    }

    /// True for the "clear with ..." family shown by flashing lamps.
    pub fn is_combined(self) -> bool {
        matches!(
            self,
            Aspect::ClearWithStop | Aspect::ClearWithClear | Aspect::ClearWithCaution
        )
    }
}

impl fmt::Display for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability class of a physical signal.
///
/// `Hsi` types are main signals governing entry into a block; `Fsi` types are
/// distant signals repeating a main signal's state ahead of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SignalType {
    /// No signal fitted in this direction.
    #[default]
    NotUsed,
    /// Two-aspect main signal.
    Hsi2,
    /// Three-aspect main signal.
    Hsi3,
    /// Four-aspect main signal.
    Hsi4,
    /// Five-aspect main signal.
    Hsi5,
    /// Two-aspect distant signal.
    Fsi2,
    /// Three-aspect distant signal.
    Fsi3,
}

use Aspect::*;

/// (type, numeric code, display name, permitted aspects)
const SIGNAL_TYPE_TABLE: [(SignalType, u8, &str, &[Aspect]); 7] = [
    (SignalType::NotUsed, 0, "Not used", &[]),
    (SignalType::Hsi2, 1, "Hsi2", &[Stop, Clear]),
    (SignalType::Hsi3, 2, "Hsi3", &[Stop, Clear, Caution]),
    (
        SignalType::Hsi4,
        3,
        "Hsi4",
        &[Stop, Clear, Caution, ClearWithStop, ClearWithClear],
    ),
    (
        SignalType::Hsi5,
        4,
        "Hsi5",
        &[
            Stop,
            Clear,
            Caution,
            ClearWithStop,
            ClearWithClear,
            ClearWithCaution,
            ShortRoute,
        ],
    ),
    (SignalType::Fsi2, 5, "Fsi2", &[ClearWithStop, ClearWithClear]),
    (
        SignalType::Fsi3,
        6,
        "Fsi3",
        &[ClearWithStop, ClearWithClear, ClearWithCaution],
    ),
];

impl SignalType {
    /// All signal types in code order.
    pub const ALL: [SignalType; 7] = [
        SignalType::NotUsed,
        SignalType::Hsi2,
        SignalType::Hsi3,
        SignalType::Hsi4,
        SignalType::Hsi5,
        SignalType::Fsi2,
        SignalType::Fsi3,
    ];

    fn entry(self) -> (SignalType, u8, &'static str, &'static [Aspect]) {
        SIGNAL_TYPE_TABLE[self as usize]
    }

    /// Numeric type code.
    pub fn code(self) -> u8 {
        self.entry().1
    }

    /// Display name, e.g. `"Hsi5"` or `"Not used"`.
    pub fn name(self) -> &'static str {
        self.entry().2
    }

    /// Aspects this type can display, excluding the `AllFlash` override.
    pub fn permitted(self) -> &'static [Aspect] {
        self.entry().3
    }

    /// Parse a display name (`"Hsi5"`, `"Not used"`). Case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        SIGNAL_TYPE_TABLE
            .iter()
            .find(|(_, _, n, _)| n.eq_ignore_ascii_case(name))
            .map(|(t, _, _, _)| *t)
    }

    /// Look up a type by numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        SIGNAL_TYPE_TABLE
            .iter()
            .find(|(_, c, _, _)| *c == code)
            .map(|(t, _, _, _)| *t)
    }

    /// Whether a signal is fitted at all.
    pub fn is_used(self) -> bool {
        self != SignalType::NotUsed
    }

    /// Distant (pre-)signal.
    pub fn is_distant(self) -> bool {
        matches!(self, SignalType::Fsi2 | SignalType::Fsi3)
    }

    /// Whether `aspect` may be shown by this type.
    pub fn supports(self, aspect: Aspect) -> bool {
        match aspect {
            Aspect::AllFlash => self.is_used(),
            other => self.permitted().contains(&other),
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Concrete lamp behaviour for a resolved aspect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LampPattern {
    /// Lamps dark (Stop).
    Off,
    /// Lamps steadily lit.
    SteadyOn,
    /// Even-duty flash at the slow period (main signal, 60 bpm family).
    FlashSlow,
    /// 3:5 duty flash at the fast period (distant signal, 80 bpm family).
    FlashFast,
    /// All lamps of the node flash regardless of direction or type.
    AllFlash,
}

/// Map a requested aspect on a signal of `signal_type` to a lamp pattern.
///
/// Returns [`SignalError::UnsupportedAspect`] when the type cannot display
/// the aspect; callers must keep the aspect they had.
pub fn resolve(signal_type: SignalType, aspect: Aspect) -> Result<LampPattern, SignalError> {
    if !signal_type.supports(aspect) {
        return Err(SignalError::UnsupportedAspect {
            signal_type,
            aspect,
        });
    }

    let pattern = match aspect {
        Aspect::Stop => LampPattern::Off,
        Aspect::AllFlash => LampPattern::AllFlash,
        combined if combined.is_combined() => {
            if signal_type.is_distant() {
                LampPattern::FlashFast
            } else {
                LampPattern::FlashSlow
            }
        }
        _ => LampPattern::SteadyOn,
    };
    Ok(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected_table(t: SignalType) -> &'static [Aspect] {
        match t {
            SignalType::NotUsed => &[],
            SignalType::Hsi2 => &[Stop, Clear],
            SignalType::Hsi3 => &[Stop, Clear, Caution],
            SignalType::Hsi4 => &[Stop, Clear, Caution, ClearWithStop, ClearWithClear],
            SignalType::Hsi5 => &[
                Stop,
                Clear,
                Caution,
                ClearWithStop,
                ClearWithClear,
                ClearWithCaution,
                ShortRoute,
            ],
            SignalType::Fsi2 => &[ClearWithStop, ClearWithClear],
            SignalType::Fsi3 => &[ClearWithStop, ClearWithClear, ClearWithCaution],
        }
    }

    #[test]
    fn resolve_rejects_exactly_outside_table() {
        for t in SignalType::ALL {
            for a in Aspect::ALL {
                if a == Aspect::AllFlash {
                    continue;
                }
                let allowed = expected_table(t).contains(&a);
                let result = resolve(t, a);
                assert_eq!(result.is_ok(), allowed, "{t} / {a}");
                if !allowed {
                    assert_eq!(
                        result,
                        Err(SignalError::UnsupportedAspect {
                            signal_type: t,
                            aspect: a
                        })
                    );
                }
            }
        }
    }

    #[test]
    fn resolve_examples() {
        assert!(resolve(SignalType::Hsi2, Aspect::Caution).is_err());
        assert_eq!(
            resolve(SignalType::Hsi5, Aspect::ShortRoute),
            Ok(LampPattern::SteadyOn)
        );
        assert_eq!(resolve(SignalType::Hsi3, Aspect::Stop), Ok(LampPattern::Off));
    }

    #[test]
    fn combined_aspects_flash_by_signal_class() {
        assert_eq!(
            resolve(SignalType::Hsi4, Aspect::ClearWithStop),
            Ok(LampPattern::FlashSlow)
        );
        assert_eq!(
            resolve(SignalType::Fsi3, Aspect::ClearWithCaution),
            Ok(LampPattern::FlashFast)
        );
        for aspect in Aspect::ALL {
            let flashes = matches!(
                resolve(SignalType::Hsi5, aspect),
                Ok(LampPattern::FlashSlow)
            );
            assert_eq!(flashes, aspect.is_combined(), "{aspect}");
        }
    }

    #[test]
    fn all_flash_override() {
        assert_eq!(
            resolve(SignalType::Fsi2, Aspect::AllFlash),
            Ok(LampPattern::AllFlash)
        );
        assert!(resolve(SignalType::NotUsed, Aspect::AllFlash).is_err());
    }

    #[test]
    fn not_used_rejects_everything() {
        for a in Aspect::ALL {
            assert!(resolve(SignalType::NotUsed, a).is_err());
        }
    }

    #[test]
    fn wire_tokens() {
        let tokens = ["stop", "d80", "d40", "d80wstop", "d80wd80", "d80wd40", "d40short"];
        for (code, token) in tokens.iter().enumerate() {
            let aspect = Aspect::from_wire(token).unwrap();
            assert_eq!(aspect.code() as usize, code);
            assert_eq!(aspect.wire_token(), Some(*token));
        }
        assert_eq!(Aspect::from_wire(" d80 \n"), Some(Aspect::Clear));
        assert_eq!(Aspect::from_wire("D80"), None);
        assert_eq!(Aspect::from_wire("allflash"), None);
        assert_eq!(Aspect::from_wire(""), None);
    }

    #[test]
    fn numeric_codes() {
        assert_eq!(Aspect::from_code(255), Some(Aspect::AllFlash));
        assert_eq!(Aspect::from_code(6), Some(Aspect::ShortRoute));
        assert_eq!(Aspect::from_code(7), None);
        assert_eq!(SignalType::from_code(4), Some(SignalType::Hsi5));
        assert_eq!(SignalType::Fsi3.code(), 6);
    }

    #[test]
    fn payloads_accept_tokens_and_codes() {
        assert_eq!(Aspect::from_payload("d80"), Some(Aspect::Clear));
        assert_eq!(Aspect::from_payload("255"), Some(Aspect::AllFlash));
        assert_eq!(Aspect::from_payload(" 3\n"), Some(Aspect::ClearWithStop));
        assert_eq!(Aspect::from_payload("7"), None);
        assert_eq!(Aspect::from_payload("256"), None);
        assert_eq!(Aspect::from_payload("-1"), None);
        assert_eq!(Aspect::from_payload("allflash"), None);
    }

    #[test]
    fn signal_type_names() {
        assert_eq!(SignalType::from_name("Hsi5"), Some(SignalType::Hsi5));
        assert_eq!(SignalType::from_name("fsi2"), Some(SignalType::Fsi2));
        assert_eq!(SignalType::from_name("Not used"), Some(SignalType::NotUsed));
        assert_eq!(SignalType::from_name("Hsi9"), None);
        assert_eq!(SignalType::NotUsed.to_string(), "Not used");
    }

    #[test]
    fn tables_are_indexed_by_discriminant() {
        for (i, (aspect, _, _)) in ASPECT_TABLE.iter().enumerate() {
            assert_eq!(*aspect as usize, i);
        }
        for (i, (t, _, _, _)) in SIGNAL_TYPE_TABLE.iter().enumerate() {
            assert_eq!(*t as usize, i);
        }
    }
}
