// src/morse/assembler.rs  -  Symbols → finished codes (boundary timer + sticky repeat)
use crate::morse::{CodeBuffer, InputMode, MorseSymbol, Timer};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// No character open.
    Idle,
    /// At least one symbol buffered.
    Accumulating,
    /// Sticky repeat: the last finished code is re-dispatched periodically.
    RepeatingPrevious,
}

/// Sticky-repeat bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepeatState {
    pub enabled:        bool,
    pub last_completed: CodeBuffer,
}

/// Accumulates symbols into a [`CodeBuffer`] and decides when a character is
/// complete.  Resolution and dispatch are the engine's job: it takes the code
/// with [`begin_finalize`](Self::begin_finalize), dispatches it, then hands it
/// back through [`complete`](Self::complete).  Both steps always run, so the
/// buffer and timers end up consistent whatever the dispatch did.
#[derive(Debug, Clone)]
pub struct CharacterAssembler {
    buffer:          CodeBuffer,
    state:           AssemblerState,
    boundary:        Timer,
    sticky:          Timer,
    repeat:          RepeatState,
    timer_driven:    bool,
    letter_pause:    Duration,
    sticky_interval: Duration,
}

impl CharacterAssembler {
    pub fn new(mode: InputMode, letter_pause: Duration, sticky_interval: Duration) -> Self {
        Self {
            buffer:       CodeBuffer::new(),
            state:        AssemblerState::Idle,
            boundary:     Timer::default(),
            sticky:       Timer::default(),
            repeat:       RepeatState::default(),
            timer_driven: mode.timer_driven(),
            letter_pause,
            sticky_interval,
        }
    }

    pub fn state(&self) -> AssemblerState { self.state }
    pub fn buffer(&self) -> &CodeBuffer { &self.buffer }
    pub fn repeat(&self) -> &RepeatState { &self.repeat }
    pub fn last_completed(&self) -> &CodeBuffer { &self.repeat.last_completed }

    /// A new switch press: sticky repeat ends and the boundary timer of the
    /// character so far is cancelled.
    pub fn on_press(&mut self) {
        self.repeat.enabled = false;
        self.sticky.cancel();
        self.boundary.cancel();
        if self.state == AssemblerState::RepeatingPrevious {
            log::debug!("[assembler] sticky repeat cancelled by press");
            self.state = AssemblerState::Idle;
        }
    }

    pub fn push(&mut self, sym: MorseSymbol, at: Instant) {
        self.buffer.push(sym);
        self.state = AssemblerState::Accumulating;
        if self.timer_driven {
            self.boundary.start_once(at, self.letter_pause);
        }
        log::debug!("[assembler] code so far '{}'", self.buffer);
    }

    /// Inactivity is measured from the last release in timer-driven modes.
    pub fn on_release(&mut self, at: Instant) {
        if self.timer_driven && !self.buffer.is_empty() {
            self.boundary.start_once(at, self.letter_pause);
        }
    }

    /// Take the finished code out of the buffer.  `None` for an empty buffer,
    /// which leaves every piece of state as it was.
    pub fn begin_finalize(&mut self) -> Option<CodeBuffer> {
        self.boundary.cancel();
        if self.buffer.is_empty() {
            return None;
        }
        Some(self.buffer.take())
    }

    /// Second half of finalisation, after the code was dispatched.  If the
    /// dispatch switched sticky repeat on, the previous code starts repeating;
    /// otherwise this code becomes the one a later repeat would use.
    pub fn complete(&mut self, code: CodeBuffer, at: Instant) {
        self.buffer.clear();
        self.state = AssemblerState::Idle;
        if self.repeat.enabled {
            if self.repeat.last_completed.is_empty() {
                log::debug!("[assembler] repeat on but no previous code to repeat");
            } else {
                log::debug!("[assembler] sticky repeat of '{}'", self.repeat.last_completed);
                self.state = AssemblerState::RepeatingPrevious;
                self.sticky.start_periodic(at, self.sticky_interval);
            }
        } else {
            self.repeat.last_completed = code;
        }
    }

    pub fn enable_repeat(&mut self) { self.repeat.enabled = true; }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.boundary.deadline(), self.sticky.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b)             => a.or(b),
        }
    }

    pub fn boundary_due(&self, limit: Instant, inclusive: bool) -> Option<Instant> {
        self.boundary.is_due(limit, inclusive).then(|| self.boundary.deadline()).flatten()
    }

    pub fn sticky_due(&self, limit: Instant, inclusive: bool) -> Option<Instant> {
        self.sticky.is_due(limit, inclusive).then(|| self.sticky.deadline()).flatten()
    }

    pub fn fire_boundary(&mut self) -> Option<Instant> { self.boundary.fire() }
    pub fn fire_sticky(&mut self) -> Option<Instant> { self.sticky.fire() }

    /// Drop the open character, all timers and the repeat state.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.boundary.cancel();
        self.sticky.cancel();
        self.repeat = RepeatState::default();
        self.state  = AssemblerState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    fn assembler(mode: InputMode) -> CharacterAssembler {
        CharacterAssembler::new(mode, ms(1000), ms(300))
    }

    #[test]
    fn symbols_restart_boundary_timer_in_timer_driven_modes() {
        let t0 = Instant::now();
        let mut a = assembler(InputMode::TwoKey);
        a.push(MorseSymbol::Dit, t0);
        assert_eq!(a.state(), AssemblerState::Accumulating);
        assert_eq!(a.next_deadline(), Some(t0 + ms(1000)));
        a.push(MorseSymbol::Dah, t0 + ms(400));
        assert_eq!(a.next_deadline(), Some(t0 + ms(1400)));
    }

    #[test]
    fn three_key_mode_never_arms_boundary_timer() {
        let t0 = Instant::now();
        let mut a = assembler(InputMode::ThreeKey);
        a.push(MorseSymbol::Dit, t0);
        a.on_release(t0 + ms(50));
        assert_eq!(a.next_deadline(), None);
    }

    #[test]
    fn finalize_empty_buffer_is_noop() {
        let mut a = assembler(InputMode::OneKey);
        assert_eq!(a.begin_finalize(), None);
        assert_eq!(a.state(), AssemblerState::Idle);
        assert!(a.last_completed().is_empty());
    }

    #[test]
    fn complete_snapshots_last_code() {
        let t0 = Instant::now();
        let mut a = assembler(InputMode::OneKey);
        a.push(MorseSymbol::Dah, t0);
        let code = a.begin_finalize().unwrap();
        a.complete(code, t0 + ms(1000));
        assert!(a.buffer().is_empty());
        assert_eq!(a.last_completed().render(), "-");
        assert_eq!(a.state(), AssemblerState::Idle);
        assert_eq!(a.next_deadline(), None);
    }

    #[test]
    fn repeat_toggle_starts_repeating_previous_code() {
        let t0 = Instant::now();
        let mut a = assembler(InputMode::TwoKey);
        a.push(MorseSymbol::Dit, t0);
        let first = a.begin_finalize().unwrap();
        a.complete(first, t0 + ms(1000));

        // The next character turns repeat on while it is dispatched.
        a.push(MorseSymbol::Dah, t0 + ms(2000));
        let toggle = a.begin_finalize().unwrap();
        a.enable_repeat();
        a.complete(toggle, t0 + ms(3000));

        assert_eq!(a.state(), AssemblerState::RepeatingPrevious);
        assert_eq!(a.last_completed().render(), ".");
        assert_eq!(a.next_deadline(), Some(t0 + ms(3300)));

        a.on_press();
        assert_eq!(a.state(), AssemblerState::Idle);
        assert!(!a.repeat().enabled);
        assert_eq!(a.next_deadline(), None);
    }

    #[test]
    fn repeat_without_previous_code_stays_idle() {
        let t0 = Instant::now();
        let mut a = assembler(InputMode::TwoKey);
        a.push(MorseSymbol::Dit, t0);
        let code = a.begin_finalize().unwrap();
        a.enable_repeat();
        a.complete(code, t0);
        assert_eq!(a.state(), AssemblerState::Idle);
        assert!(a.last_completed().is_empty());
    }
}
