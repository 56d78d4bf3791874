// src/morse/timer.rs  -  Engine-owned scheduled task handles
use std::time::{Duration, Instant};

/// A single-shot or periodic deadline.  Nothing runs by itself: the engine
/// loop asks for the earliest deadline, sleeps until then and calls
/// [`Timer::fire`].  Starting a running timer replaces it, cancelling is
/// always safe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<Instant>,
    period:   Option<Duration>,
}

impl Timer {
    pub fn start_once(&mut self, now: Instant, after: Duration) {
        self.deadline = Some(now + after);
        self.period   = None;
    }

    pub fn start_periodic(&mut self, now: Instant, period: Duration) {
        self.deadline = Some(now + period);
        self.period   = Some(period);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
        self.period   = None;
    }

    pub fn is_running(&self) -> bool { self.deadline.is_some() }
    pub fn deadline(&self) -> Option<Instant> { self.deadline }

    /// `inclusive` decides whether a deadline equal to `limit` counts as due.
    pub fn is_due(&self, limit: Instant, inclusive: bool) -> bool {
        match self.deadline {
            Some(d) if inclusive => d <= limit,
            Some(d)              => d < limit,
            None                 => false,
        }
    }

    /// Consume one expiry and return the instant it was scheduled for.
    /// Periodic timers re-arm one period later; single-shot timers stop.
    pub fn fire(&mut self) -> Option<Instant> {
        let due = self.deadline?;
        match self.period {
            Some(p) => self.deadline = Some(due + p),
            None    => self.cancel(),
        }
        Some(due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_shot_fires_once() {
        let t0 = Instant::now();
        let mut t = Timer::default();
        t.start_once(t0, Duration::from_millis(10));
        assert!(!t.is_due(t0, true));
        assert!(t.is_due(t0 + Duration::from_millis(10), true));
        assert!(!t.is_due(t0 + Duration::from_millis(10), false));
        assert_eq!(t.fire(), Some(t0 + Duration::from_millis(10)));
        assert!(!t.is_running());
        assert_eq!(t.fire(), None);
    }

    #[test]
    fn periodic_rearms_from_previous_deadline() {
        let t0 = Instant::now();
        let mut t = Timer::default();
        t.start_periodic(t0, Duration::from_millis(100));
        assert_eq!(t.fire(), Some(t0 + Duration::from_millis(100)));
        assert_eq!(t.deadline(), Some(t0 + Duration::from_millis(200)));
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut t = Timer::default();
        t.cancel();
        t.cancel();
        assert_eq!(t, Timer::default());
    }
}
