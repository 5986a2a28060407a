//! Error taxonomy for the block-signal engine.
//!
//! None of these errors is fatal. Lamp, sensor and aspect errors are
//! handled where they occur (the previous valid state is kept) and are
//! surfaced through [`NodeStats`](crate::NodeStats) counters and log events.

use crate::aspect::{Aspect, SignalType};

/// Errors raised by the engine's components.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    /// Lamp level outside 0–255.
    #[error("lamp level {0} is outside 0-255")]
    OutOfRange(i32),

    /// The signal type cannot display the requested aspect.
    #[error("{signal_type} signal cannot show aspect {aspect}")]
    UnsupportedAspect {
        /// Type of the addressed signal.
        signal_type: SignalType,
        /// Aspect that was requested.
        aspect: Aspect,
    },

    /// Both block sensors tripped inside the simultaneity window.
    #[error("both sensors tripped simultaneously, direction unknown")]
    AmbiguousDirection,

    /// Inbound message could not be parsed.
    #[error("malformed message on {topic}")]
    MalformedMessage {
        /// Topic the payload arrived on.
        topic: String,
    },

    /// The pub/sub transport is down.
    #[error("messaging link unavailable")]
    LinkUnavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            SignalError::OutOfRange(300).to_string(),
            "lamp level 300 is outside 0-255"
        );
        let err = SignalError::UnsupportedAspect {
            signal_type: SignalType::Hsi2,
            aspect: Aspect::Caution,
        };
        assert_eq!(err.to_string(), "Hsi2 signal cannot show aspect d40");
        assert_eq!(
            SignalError::LinkUnavailable.to_string(),
            "messaging link unavailable"
        );
    }
}
