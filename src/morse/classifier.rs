// src/morse/classifier.rs  -  Switch press/release → dit, dah or end-of-character
use crate::keyer::KeyRole;
use crate::morse::{InputMode, MorseSymbol, Timer, TimingConfig};
use std::time::{Duration, Instant};

/// What a switch edge means for the character being keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Symbol(MorseSymbol),
    /// Tertiary switch: finish the character now.
    EndCharacter,
}

/// Result of feeding one press or release to the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Overlapping press, release without press, or a role the mode does not use.
    Ignored,
    /// Edge taken; may or may not carry a signal.
    Accepted(Option<Signal>),
}

/// Per-role press tracking.
///
/// * OneKey: nothing on press, duration-classified symbol on release.
/// * TwoKey / ThreeKey: role-classified signal on press, nothing on release.
///
/// With fast-repeat on (multi-key modes only) a press also arms a periodic
/// timer that re-emits the pressed role's signal until that role is released.
#[derive(Debug, Clone)]
pub struct TimingClassifier {
    mode:         InputMode,
    timing:       TimingConfig,
    fast_repeat:  Option<Duration>,
    open:         [Option<Instant>; 3],
    repeat_timer: Timer,
    repeat_role:  Option<KeyRole>,
}

impl TimingClassifier {
    pub fn new(mode: InputMode, timing: TimingConfig, fast_repeat: Option<Duration>) -> Self {
        let fast_repeat = if mode.classifies_by_duration() {
            if fast_repeat.is_some() {
                log::debug!("[classifier] fast-repeat has no meaning in one-key mode, ignored");
            }
            None
        } else {
            fast_repeat
        };
        Self {
            mode,
            timing,
            fast_repeat,
            open:         [None; 3],
            repeat_timer: Timer::default(),
            repeat_role:  None,
        }
    }

    pub fn mode(&self) -> InputMode { self.mode }
    pub fn fast_repeat(&self) -> Option<Duration> { self.fast_repeat }
    pub fn is_open(&self, role: KeyRole) -> bool { self.open[role.index()].is_some() }

    pub fn press(&mut self, role: KeyRole, at: Instant) -> Classification {
        if !self.mode.uses_role(role) {
            log::debug!("[classifier] {role} switch not used in {:?}, ignored", self.mode);
            return Classification::Ignored;
        }
        let slot = &mut self.open[role.index()];
        if slot.is_some() {
            log::debug!("[classifier] {role} already held, press ignored");
            return Classification::Ignored;
        }
        *slot = Some(at);

        if self.mode.classifies_by_duration() {
            return Classification::Accepted(None);
        }

        if let Some(period) = self.fast_repeat.filter(|_| role != KeyRole::Tertiary) {
            self.repeat_timer.start_periodic(at, period);
            self.repeat_role = Some(role);
        }
        Classification::Accepted(Some(role_signal(role)))
    }

    pub fn release(&mut self, role: KeyRole, at: Instant) -> Classification {
        if !self.mode.uses_role(role) {
            return Classification::Ignored;
        }
        let Some(started) = self.open[role.index()].take() else {
            log::debug!("[classifier] {role} released without a press, ignored");
            return Classification::Ignored;
        };

        if self.repeat_role == Some(role) {
            self.cancel_repeat();
        }

        if !self.mode.classifies_by_duration() {
            return Classification::Accepted(None);
        }

        let held = at.saturating_duration_since(started);
        let sym  = self.timing.classify(held);
        log::debug!("[classifier] held {}ms → {}", held.as_millis(), sym.as_char());
        Classification::Accepted(Some(Signal::Symbol(sym)))
    }

    pub fn next_deadline(&self) -> Option<Instant> { self.repeat_timer.deadline() }

    pub fn repeat_due(&self, limit: Instant, inclusive: bool) -> bool {
        self.repeat_timer.is_due(limit, inclusive)
    }

    /// Fire the fast-repeat timer once: the instant it was due and the
    /// held role's signal.
    pub fn fire_repeat(&mut self) -> Option<(Instant, Signal)> {
        let due = self.repeat_timer.fire()?;
        self.repeat_role.map(|role| (due, role_signal(role)))
    }

    pub fn cancel_repeat(&mut self) {
        self.repeat_timer.cancel();
        self.repeat_role = None;
    }

    /// Forget all open presses and stop the fast-repeat timer.
    pub fn reset(&mut self) {
        self.open = [None; 3];
        self.cancel_repeat();
    }
}

fn role_signal(role: KeyRole) -> Signal {
    match role {
        KeyRole::Primary   => Signal::Symbol(MorseSymbol::Dit),
        KeyRole::Secondary => Signal::Symbol(MorseSymbol::Dah),
        KeyRole::Tertiary  => Signal::EndCharacter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    fn classifier(mode: InputMode, fast: Option<Duration>) -> TimingClassifier {
        TimingClassifier::new(mode, TimingConfig::from_millis(350, 1000), fast)
    }

    #[test]
    fn one_key_classifies_on_release() {
        let t0 = Instant::now();
        let mut c = classifier(InputMode::OneKey, None);
        assert_eq!(c.press(KeyRole::Primary, t0), Classification::Accepted(None));
        assert_eq!(
            c.release(KeyRole::Primary, t0 + ms(100)),
            Classification::Accepted(Some(Signal::Symbol(MorseSymbol::Dit)))
        );
        c.press(KeyRole::Primary, t0 + ms(200));
        assert_eq!(
            c.release(KeyRole::Primary, t0 + ms(550)),
            Classification::Accepted(Some(Signal::Symbol(MorseSymbol::Dah)))
        );
    }

    #[test]
    fn multi_key_classifies_on_press_by_role() {
        let t0 = Instant::now();
        let mut c = classifier(InputMode::ThreeKey, None);
        assert_eq!(c.press(KeyRole::Primary, t0), Classification::Accepted(Some(Signal::Symbol(MorseSymbol::Dit))));
        assert_eq!(c.press(KeyRole::Secondary, t0), Classification::Accepted(Some(Signal::Symbol(MorseSymbol::Dah))));
        assert_eq!(c.press(KeyRole::Tertiary, t0), Classification::Accepted(Some(Signal::EndCharacter)));
        // Held for a long time: still no duration check.
        assert_eq!(c.release(KeyRole::Primary, t0 + ms(5_000)), Classification::Accepted(None));
    }

    #[test]
    fn overlapping_press_is_debounced() {
        let t0 = Instant::now();
        let mut c = classifier(InputMode::TwoKey, None);
        assert!(matches!(c.press(KeyRole::Primary, t0), Classification::Accepted(_)));
        assert_eq!(c.press(KeyRole::Primary, t0 + ms(10)), Classification::Ignored);
        assert_eq!(c.release(KeyRole::Secondary, t0 + ms(20)), Classification::Ignored);
    }

    #[test]
    fn unused_role_is_ignored() {
        let mut c = classifier(InputMode::TwoKey, None);
        assert_eq!(c.press(KeyRole::Tertiary, Instant::now()), Classification::Ignored);
    }

    #[test]
    fn fast_repeat_only_in_multi_key_modes() {
        assert_eq!(classifier(InputMode::OneKey, Some(ms(100))).fast_repeat(), None);
        assert_eq!(classifier(InputMode::TwoKey, Some(ms(100))).fast_repeat(), Some(ms(100)));
    }

    #[test]
    fn fast_repeat_re_emits_until_release() {
        let t0 = Instant::now();
        let mut c = classifier(InputMode::TwoKey, Some(ms(100)));
        c.press(KeyRole::Secondary, t0);
        assert_eq!(c.next_deadline(), Some(t0 + ms(100)));
        assert_eq!(c.fire_repeat(), Some((t0 + ms(100), Signal::Symbol(MorseSymbol::Dah))));
        assert_eq!(c.next_deadline(), Some(t0 + ms(200)));
        c.release(KeyRole::Secondary, t0 + ms(150));
        assert_eq!(c.next_deadline(), None);
        assert_eq!(c.fire_repeat(), None);
    }
}
