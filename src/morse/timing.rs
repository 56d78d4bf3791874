// src/morse/timing.rs  -  Press-duration thresholds and input arity
use crate::keyer::KeyRole;
use crate::morse::MorseSymbol;
use std::time::Duration;

pub const DEFAULT_MAX_DIT:         Duration = Duration::from_millis(350);
pub const DEFAULT_LETTER_PAUSE:    Duration = Duration::from_millis(1000);
/// Fast-repeat re-emit period while a switch is held.
pub const DEFAULT_FAST_REPEAT:     Duration = Duration::from_millis(100);
/// Sticky repeat re-dispatch period.  Longer than fast-repeat on purpose.
pub const DEFAULT_STICKY_INTERVAL: Duration = Duration::from_millis(300);

/// Single-switch thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    /// Presses shorter than this are dits; at or above it, dahs.
    pub max_dit:          Duration,
    /// Inactivity that ends a character in timer-driven modes.
    pub min_letter_pause: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            max_dit:          DEFAULT_MAX_DIT,
            min_letter_pause: DEFAULT_LETTER_PAUSE,
        }
    }
}

impl TimingConfig {
    pub fn from_millis(max_dit_ms: u64, min_letter_pause_ms: u64) -> Self {
        Self {
            max_dit:          Duration::from_millis(max_dit_ms),
            min_letter_pause: Duration::from_millis(min_letter_pause_ms),
        }
    }

    /// Boundary value classifies as a dah.
    pub fn classify(&self, held: Duration) -> MorseSymbol {
        if held < self.max_dit { MorseSymbol::Dit } else { MorseSymbol::Dah }
    }
}

/// How many switches the user has and what each of them means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// One switch: press length decides dit/dah, a pause ends the character.
    OneKey,
    /// Dit switch + dah switch, a pause ends the character.
    TwoKey,
    /// Dit + dah + an explicit end-of-character switch.
    ThreeKey,
}

impl InputMode {
    pub fn from_arity(arity: u8) -> Option<Self> {
        match arity {
            1 => Some(InputMode::OneKey),
            2 => Some(InputMode::TwoKey),
            3 => Some(InputMode::ThreeKey),
            _ => None,
        }
    }

    pub fn arity(self) -> u8 {
        match self {
            InputMode::OneKey   => 1,
            InputMode::TwoKey   => 2,
            InputMode::ThreeKey => 3,
        }
    }

    /// Roles that must have a physical key in this mode.
    pub fn roles(self) -> &'static [KeyRole] {
        match self {
            InputMode::OneKey   => &[KeyRole::Primary],
            InputMode::TwoKey   => &[KeyRole::Primary, KeyRole::Secondary],
            InputMode::ThreeKey => &[KeyRole::Primary, KeyRole::Secondary, KeyRole::Tertiary],
        }
    }

    pub fn uses_role(self, role: KeyRole) -> bool { self.roles().contains(&role) }

    /// Symbols come from press duration (on release) rather than from the role (on press).
    pub fn classifies_by_duration(self) -> bool { self == InputMode::OneKey }

    /// Characters end on inactivity rather than on the tertiary switch.
    pub fn timer_driven(self) -> bool { self != InputMode::ThreeKey }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn boundary_is_a_dah() {
        let t = TimingConfig::from_millis(350, 1000);
        assert_eq!(t.classify(Duration::from_millis(349)), MorseSymbol::Dit);
        assert_eq!(t.classify(Duration::from_millis(350)), MorseSymbol::Dah);
    }

    #[test]
    fn modes_round_trip_arity() {
        for arity in 1..=3 {
            assert_eq!(InputMode::from_arity(arity).unwrap().arity(), arity);
        }
        assert!(InputMode::from_arity(0).is_none());
        assert!(InputMode::from_arity(4).is_none());
    }

    #[test]
    fn only_three_key_is_explicitly_terminated() {
        assert!(InputMode::OneKey.timer_driven());
        assert!(InputMode::TwoKey.timer_driven());
        assert!(!InputMode::ThreeKey.timer_driven());
        assert!(!InputMode::TwoKey.uses_role(KeyRole::Tertiary));
    }

    proptest! {
        #[test]
        fn classification_splits_at_max_dit(max_ms in 1u64..5_000, held_ms in 0u64..10_000) {
            let t = TimingConfig::from_millis(max_ms, 1000);
            let sym = t.classify(Duration::from_millis(held_ms));
            if held_ms < max_ms {
                prop_assert_eq!(sym, MorseSymbol::Dit);
            } else {
                prop_assert_eq!(sym, MorseSymbol::Dah);
            }
        }
    }
}
