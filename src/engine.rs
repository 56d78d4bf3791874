// src/engine.rs  -  DecoderEngine: classifier + assembler + resolution + dispatch, single-threaded
//
// The engine owns every piece of decoder state and all three timers
// (fast-repeat, character boundary, sticky repeat).  Nothing here blocks:
// the caller feeds switch events and calls advance() when next_deadline()
// has passed.  run_loop() does exactly that on top of the bridge channel.
//
// Timer expiries that fall strictly before an incoming event are processed
// first, each at its own deadline, so a late event never reorders history.

use crate::action::{ActionDispatcher, Outcome};
use crate::error::ConfigError;
use crate::keyer::{BridgeMsg, EventBridge, KeyBindings, SwitchEvent};
use crate::layout::{Layout, LayoutStore};
use crate::morse::timing::DEFAULT_STICKY_INTERVAL;
use crate::morse::{
    AssemblerState, CharacterAssembler, Classification, CodeBuffer, InputMode, Signal,
    TimingClassifier, TimingConfig,
};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

// ── Settings ──────────────────────────────────────────────────────────────────

/// Everything the engine needs to know about the user's switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub mode:            InputMode,
    pub timing:          TimingConfig,
    /// Fast-repeat period; `None` = off.  Ignored in one-key mode.
    pub fast_repeat:     Option<Duration>,
    pub sticky_interval: Duration,
    pub bindings:        KeyBindings,
}

impl EngineSettings {
    pub fn new(mode: InputMode, timing: TimingConfig, bindings: KeyBindings) -> Self {
        Self { mode, timing, fast_repeat: None, sticky_interval: DEFAULT_STICKY_INTERVAL, bindings }
    }

    pub fn with_fast_repeat(mut self, period: Option<Duration>) -> Self {
        self.fast_repeat = period;
        self
    }

    pub fn with_sticky_interval(mut self, interval: Duration) -> Self {
        self.sticky_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timing.max_dit.is_zero() {
            return Err(ConfigError::ZeroDuration("max_dit_ms"));
        }
        if self.timing.min_letter_pause.is_zero() {
            return Err(ConfigError::ZeroDuration("min_letter_pause_ms"));
        }
        if self.sticky_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("sticky_repeat_interval_ms"));
        }
        if self.fast_repeat.is_some_and(|p| p.is_zero()) {
            return Err(ConfigError::ZeroDuration("fast_repeat_interval_ms"));
        }
        for &role in self.mode.roles() {
            if self.bindings.key_for(role).is_none() {
                return Err(ConfigError::MissingBinding(role));
            }
        }
        Ok(())
    }
}

// ── Feedback ──────────────────────────────────────────────────────────────────

/// A layout entry still reachable from the code keyed so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub code:  String,
    pub label: String,
}

/// Observer for whatever shows the user what is going on (keypad view,
/// log, test recorder).  All methods default to doing nothing.
pub trait Feedback {
    /// Whether [`Feedback::symbol`] should get the candidate list; building
    /// it can ask the predictor for labels.
    fn wants_candidates(&self) -> bool { true }
    fn symbol(&mut self, _code: &CodeBuffer, _candidates: &[Candidate]) {}
    /// `label` is `None` when the code matched nothing.
    fn finalized(&mut self, _code: &CodeBuffer, _label: Option<&str>) {}
    /// Per-character state cleared.
    fn reset(&mut self) {}
    fn layout_changed(&mut self, _layout: &Layout) {}
}

pub struct NullFeedback;

impl Feedback for NullFeedback {
    fn wants_candidates(&self) -> bool { false }
}

/// Reports progress through the log, `debug` level.
pub struct LogFeedback;

impl Feedback for LogFeedback {
    fn symbol(&mut self, code: &CodeBuffer, candidates: &[Candidate]) {
        let list: Vec<String> = candidates.iter().map(|c| format!("{}={}", c.code, c.label)).collect();
        log::debug!("[feedback] '{code}' possible: {}", list.join(" "));
    }
    fn finalized(&mut self, code: &CodeBuffer, label: Option<&str>) {
        log::debug!("[feedback] '{code}' → {}", label.unwrap_or("(nothing)"));
    }
    fn layout_changed(&mut self, layout: &Layout) {
        log::debug!("[feedback] layout '{}' with {} entries", layout.name(), layout.len());
    }
}

// ── Engine ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    FastRepeat,
    Boundary,
    Sticky,
}

pub struct DecoderEngine {
    settings:   EngineSettings,
    classifier: TimingClassifier,
    assembler:  CharacterAssembler,
    layouts:    LayoutStore,
    dispatcher: ActionDispatcher,
    feedback:   Box<dyn Feedback>,
    running:    bool,
}

impl DecoderEngine {
    pub fn new(
        settings:   EngineSettings,
        layouts:    LayoutStore,
        dispatcher: ActionDispatcher,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        let (classifier, assembler) = Self::build(&settings);
        Ok(Self {
            settings,
            classifier,
            assembler,
            layouts,
            dispatcher,
            feedback: Box::new(NullFeedback),
            running:  false,
        })
    }

    pub fn with_feedback(mut self, feedback: Box<dyn Feedback>) -> Self {
        self.feedback = feedback;
        self
    }

    fn build(settings: &EngineSettings) -> (TimingClassifier, CharacterAssembler) {
        let classifier = TimingClassifier::new(settings.mode, settings.timing, settings.fast_repeat);
        let assembler = CharacterAssembler::new(
            settings.mode,
            settings.timing.min_letter_pause,
            settings.sticky_interval,
        );
        (classifier, assembler)
    }

    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        log::info!(
            "[engine] started: {:?}, layout '{}', output {}",
            self.settings.mode,
            self.layouts.active_name(),
            self.dispatcher.synth_name()
        );
    }

    /// Cancel all timers, drop the open character and the repeat state,
    /// release latched keys.  Safe to call when already stopped.
    pub fn stop(&mut self) {
        self.classifier.reset();
        self.assembler.reset();
        self.dispatcher.release_held();
        self.feedback.reset();
        if self.running {
            self.running = false;
            log::info!("[engine] stopped");
        }
    }

    /// Switch to new settings.  On error the old ones stay in force;
    /// on success the open character and all timers are dropped.
    /// The switch source is not touched: with a bridge running, use
    /// [`DecoderEngine::change_mode`] so it listens to the new keys.
    pub fn reconfigure(&mut self, settings: EngineSettings) -> Result<(), ConfigError> {
        settings.validate()?;
        let (classifier, assembler) = Self::build(&settings);
        self.classifier = classifier;
        self.assembler  = assembler;
        self.settings   = settings;
        self.feedback.reset();
        log::info!("[engine] reconfigured: {:?}", self.settings.mode);
        Ok(())
    }

    /// Re-subscribe `bridge` to the new bindings, then reconfigure.
    /// When either step is refused the previous mode stays in force on both sides.
    pub fn change_mode(&mut self, settings: EngineSettings, bridge: &EventBridge) -> anyhow::Result<()> {
        settings.validate()?;
        bridge.rebind(settings.bindings.clone())?;
        self.reconfigure(settings)?;
        Ok(())
    }

    pub fn is_running(&self) -> bool { self.running }
    pub fn settings(&self) -> &EngineSettings { &self.settings }
    pub fn state(&self) -> AssemblerState { self.assembler.state() }
    pub fn current_code(&self) -> &CodeBuffer { self.assembler.buffer() }
    pub fn last_completed(&self) -> &CodeBuffer { self.assembler.last_completed() }
    pub fn repeat_enabled(&self) -> bool { self.assembler.repeat().enabled }
    pub fn layouts(&self) -> &LayoutStore { &self.layouts }
    pub fn active_layout(&self) -> &Layout { self.layouts.active() }
    pub fn dispatcher(&self) -> &ActionDispatcher { &self.dispatcher }
    pub fn dispatcher_mut(&mut self) -> &mut ActionDispatcher { &mut self.dispatcher }

    /// Earliest pending timer, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.classifier.next_deadline(), self.assembler.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b)             => a.or(b),
        }
    }

    /// Fire every timer due at or before `now`.
    pub fn advance(&mut self, now: Instant) {
        if self.running {
            self.fire_due(now, true);
        }
    }

    pub fn handle_event(&mut self, ev: SwitchEvent) {
        if !self.running {
            log::debug!("[engine] not running, {} {} dropped", ev.role, if ev.pressed { "press" } else { "release" });
            return;
        }
        self.fire_due(ev.at, false);

        let classified = if ev.pressed {
            self.classifier.press(ev.role, ev.at)
        } else {
            self.classifier.release(ev.role, ev.at)
        };
        let Classification::Accepted(signal) = classified else { return };

        if ev.pressed {
            self.assembler.on_press();
        }
        if let Some(signal) = signal {
            self.apply(signal, ev.at);
        }
        if !ev.pressed {
            self.assembler.on_release(ev.at);
        }
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn fire_due(&mut self, limit: Instant, inclusive: bool) {
        loop {
            let repeat = if self.classifier.repeat_due(limit, inclusive) {
                self.classifier.next_deadline()
            } else {
                None
            };
            let next = [
                (repeat, TimerKind::FastRepeat),
                (self.assembler.boundary_due(limit, inclusive), TimerKind::Boundary),
                (self.assembler.sticky_due(limit, inclusive), TimerKind::Sticky),
            ]
            .into_iter()
            .filter_map(|(due, kind)| due.map(|d| (d, kind)))
            .min_by_key(|(due, _)| *due);

            let Some((_, kind)) = next else { break };
            match kind {
                TimerKind::FastRepeat => {
                    if let Some((at, signal)) = self.classifier.fire_repeat() {
                        log::debug!("[engine] fast-repeat tick");
                        self.apply(signal, at);
                    }
                }
                TimerKind::Boundary => {
                    if let Some(at) = self.assembler.fire_boundary() {
                        self.finalize(at);
                    }
                }
                TimerKind::Sticky => {
                    if let Some(at) = self.assembler.fire_sticky() {
                        self.replay_previous(at);
                    }
                }
            }
        }
    }

    fn apply(&mut self, signal: Signal, at: Instant) {
        match signal {
            Signal::Symbol(sym) => {
                let limit = self.layouts.active().max_code_len();
                if self.assembler.buffer().len() >= limit {
                    log::debug!(
                        "[engine] '{}' already as long as the longest code in '{}', {} dropped",
                        self.assembler.buffer(),
                        self.layouts.active_name(),
                        sym.as_char()
                    );
                    return;
                }
                self.assembler.push(sym, at);
                self.report_symbol();
            }
            Signal::EndCharacter => self.finalize(at),
        }
    }

    fn report_symbol(&mut self) {
        let candidates = if self.feedback.wants_candidates() {
            let code = self.assembler.buffer();
            let dispatcher = &mut self.dispatcher;
            self.layouts
                .active()
                .candidates(code)
                .into_iter()
                .map(|e| Candidate { code: e.code.render(), label: dispatcher.label_for(e) })
                .collect()
        } else {
            Vec::new()
        };
        self.feedback.symbol(self.assembler.buffer(), &candidates);
    }

    /// End the open character: resolve, dispatch, then always clear the
    /// buffer and settle the timers, whatever the action did.
    fn finalize(&mut self, at: Instant) {
        let Some(code) = self.assembler.begin_finalize() else {
            log::debug!("[engine] end of character with nothing keyed");
            return;
        };
        let label = self
            .layouts
            .active()
            .lookup(&code)
            .map(|e| self.dispatcher.label_for(e));
        let outcome = self.dispatch(&code);

        if outcome == Some(Outcome::EnableRepeat) {
            self.assembler.enable_repeat();
        }
        self.feedback.finalized(&code, label.as_deref());
        self.assembler.complete(code, at);
        self.feedback.reset();

        if let Some(Outcome::SwitchLayout(name)) = outcome {
            self.switch_layout(&name);
        }
    }

    /// Sticky-repeat tick: run the previous character's action again.
    fn replay_previous(&mut self, _at: Instant) {
        let code = self.assembler.last_completed().clone();
        if code.is_empty() {
            return;
        }
        log::debug!("[engine] sticky repeat of '{code}'");
        if let Some(Outcome::SwitchLayout(name)) = self.dispatch(&code) {
            self.switch_layout(&name);
        }
    }

    fn dispatch(&mut self, code: &CodeBuffer) -> Option<Outcome> {
        let Some(action) = self.layouts.resolve(code) else {
            log::warn!("[engine] no action for '{code}' in layout '{}'", self.layouts.active_name());
            return None;
        };
        match self.dispatcher.perform(action) {
            Ok(outcome) => {
                log::debug!("[engine] '{code}' performed → {outcome:?}");
                Some(outcome)
            }
            Err(e) => {
                log::error!("[engine] action for '{code}' failed: {e}");
                None
            }
        }
    }

    fn switch_layout(&mut self, name: &str) {
        match self.layouts.set_active(name) {
            Ok(()) => self.feedback.layout_changed(self.layouts.active()),
            Err(e) => log::error!("[engine] layout change failed: {e}"),
        }
    }
}

// ── Loop ──────────────────────────────────────────────────────────────────────

/// Run the engine on the bridge channel until Quit or the channel closes.
pub fn run_loop(engine: &mut DecoderEngine, rx: &Receiver<BridgeMsg>) {
    engine.start();
    loop {
        let msg = match engine.next_deadline() {
            Some(deadline) => {
                let now = Instant::now();
                if deadline <= now {
                    engine.advance(now);
                    continue;
                }
                match rx.recv_timeout(deadline - now) {
                    Ok(msg) => msg,
                    Err(RecvTimeoutError::Timeout) => {
                        engine.advance(Instant::now());
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(msg) => msg,
                Err(_)  => break,
            },
        };
        match msg {
            BridgeMsg::Switch(ev) => engine.handle_event(ev),
            BridgeMsg::Quit => {
                log::info!("[engine] quit requested");
                break;
            }
        }
    }
}

/// Two-phase shutdown: stop the bridge (it drains its source), apply what
/// is still queued, then stop the engine.
pub fn shutdown(engine: &mut DecoderEngine, bridge: &mut EventBridge, rx: &Receiver<BridgeMsg>) {
    bridge.stop();
    for msg in rx.try_iter() {
        if let BridgeMsg::Switch(ev) = msg {
            engine.handle_event(ev);
        }
    }
    engine.stop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyer::{ChannelSource, KeyRole, SourceEvent};
    use crate::layout::builtin::builtin_store;
    use crate::output::NullSynth;
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};
    use std::thread;

    /// Codes seen by `Feedback::symbol`, then `=label` per finalized code.
    #[derive(Clone, Default)]
    struct Trace(Arc<Mutex<Vec<String>>>);

    impl Trace {
        fn entries(&self) -> Vec<String> { self.0.lock().unwrap().clone() }
    }

    impl Feedback for Trace {
        fn wants_candidates(&self) -> bool { false }
        fn symbol(&mut self, code: &CodeBuffer, _candidates: &[Candidate]) {
            self.0.lock().unwrap().push(code.render());
        }
        fn finalized(&mut self, code: &CodeBuffer, label: Option<&str>) {
            self.0.lock().unwrap().push(format!("{code}={}", label.unwrap_or("-")));
        }
    }

    fn settings(mode: InputMode) -> EngineSettings {
        let bindings = KeyBindings::for_mode(mode, ["SPACE", "ENTER", "RCTRL"]).unwrap();
        EngineSettings::new(mode, TimingConfig::default(), bindings)
    }

    fn engine(mode: InputMode) -> DecoderEngine {
        let dispatcher = ActionDispatcher::new(Box::new(NullSynth));
        let mut e = DecoderEngine::new(settings(mode), builtin_store().unwrap(), dispatcher).unwrap();
        e.start();
        e
    }

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    #[test]
    fn settings_validation() {
        let mut s = settings(InputMode::TwoKey);
        s.timing.max_dit = Duration::ZERO;
        assert_eq!(s.validate(), Err(ConfigError::ZeroDuration("max_dit_ms")));

        let s = settings(InputMode::TwoKey).with_fast_repeat(Some(Duration::ZERO));
        assert_eq!(s.validate(), Err(ConfigError::ZeroDuration("fast_repeat_interval_ms")));

        let mut s = settings(InputMode::TwoKey);
        s.mode = InputMode::ThreeKey;
        assert_eq!(s.validate(), Err(ConfigError::MissingBinding(KeyRole::Tertiary)));
    }

    #[test]
    fn events_before_start_are_dropped() {
        let dispatcher = ActionDispatcher::new(Box::new(NullSynth));
        let mut e = DecoderEngine::new(settings(InputMode::TwoKey), builtin_store().unwrap(), dispatcher).unwrap();
        e.handle_event(SwitchEvent::press(KeyRole::Primary, Instant::now()));
        assert!(e.current_code().is_empty());
    }

    #[test]
    fn boundary_timer_fires_once_and_clears() {
        let t0 = Instant::now();
        let mut e = engine(InputMode::TwoKey);
        e.handle_event(SwitchEvent::press(KeyRole::Primary, t0));
        e.handle_event(SwitchEvent::release(KeyRole::Primary, t0 + ms(80)));
        assert_eq!(e.next_deadline(), Some(t0 + ms(1080)));
        e.advance(t0 + ms(1079));
        assert_eq!(e.current_code().render(), ".");
        e.advance(t0 + ms(1080));
        assert!(e.current_code().is_empty());
        assert_eq!(e.state(), AssemblerState::Idle);
        assert_eq!(e.last_completed().render(), ".");
        assert_eq!(e.next_deadline(), None);
    }

    #[test]
    fn change_layout_applies_after_finalize() {
        let t0 = Instant::now();
        let mut e = engine(InputMode::ThreeKey);
        for (i, role) in [KeyRole::Primary, KeyRole::Secondary, KeyRole::Secondary, KeyRole::Primary, KeyRole::Secondary]
            .into_iter()
            .enumerate()
        {
            let at = t0 + ms(i as u64 * 100);
            e.handle_event(SwitchEvent::press(role, at));
            e.handle_event(SwitchEvent::release(role, at + ms(50)));
        }
        assert_eq!(e.active_layout().name(), "typing");
        e.handle_event(SwitchEvent::press(KeyRole::Tertiary, t0 + ms(600)));
        assert_eq!(e.active_layout().name(), "mouse");
        assert!(e.current_code().is_empty());
    }

    #[test]
    fn stop_is_idempotent_and_cancels_timers() {
        let t0 = Instant::now();
        let mut e = engine(InputMode::TwoKey);
        e.handle_event(SwitchEvent::press(KeyRole::Secondary, t0));
        assert!(e.next_deadline().is_some());
        e.stop();
        e.stop();
        assert!(!e.is_running());
        assert_eq!(e.next_deadline(), None);
        assert!(e.current_code().is_empty());
    }

    #[test]
    fn failed_reconfigure_keeps_old_settings() {
        let mut e = engine(InputMode::TwoKey);
        let mut bad = settings(InputMode::OneKey);
        bad.timing.min_letter_pause = Duration::ZERO;
        assert!(e.reconfigure(bad).is_err());
        assert_eq!(e.settings().mode, InputMode::TwoKey);
        e.reconfigure(settings(InputMode::ThreeKey)).unwrap();
        assert_eq!(e.settings().mode, InputMode::ThreeKey);
    }
    #[test]
    fn held_switch_never_outgrows_the_longest_code() {
        let t0 = Instant::now();
        let s = settings(InputMode::ThreeKey).with_fast_repeat(Some(ms(100)));
        let dispatcher = ActionDispatcher::new(Box::new(NullSynth));
        let mut e = DecoderEngine::new(s, builtin_store().unwrap(), dispatcher).unwrap();
        e.start();
        let longest = e.active_layout().max_code_len();

        e.handle_event(SwitchEvent::press(KeyRole::Primary, t0));
        e.advance(t0 + Duration::from_secs(60));
        assert_eq!(e.current_code().len(), longest);

        // the end switch still finalizes what was kept
        e.handle_event(SwitchEvent::release(KeyRole::Primary, t0 + Duration::from_secs(60)));
        e.handle_event(SwitchEvent::press(KeyRole::Tertiary, t0 + Duration::from_secs(61)));
        assert!(e.current_code().is_empty());
        assert_eq!(e.state(), AssemblerState::Idle);
    }

    #[test]
    fn run_loop_finalizes_on_real_pause_and_stops_on_quit() {
        let mut s = settings(InputMode::TwoKey);
        s.timing = TimingConfig::from_millis(350, 50);
        let trace = Trace::default();
        let dispatcher = ActionDispatcher::new(Box::new(NullSynth));
        let mut e = DecoderEngine::new(s, builtin_store().unwrap(), dispatcher)
            .unwrap()
            .with_feedback(Box::new(trace.clone()));

        let (tx, rx) = mpsc::channel();
        let now = Instant::now();
        tx.send(BridgeMsg::Switch(SwitchEvent::press(KeyRole::Primary, now))).unwrap();
        tx.send(BridgeMsg::Switch(SwitchEvent::release(KeyRole::Primary, now + ms(10)))).unwrap();
        let quitter = thread::spawn(move || {
            thread::sleep(ms(300));
            tx.send(BridgeMsg::Quit).unwrap();
            tx
        });

        run_loop(&mut e, &rx);
        let _tx = quitter.join().unwrap();
        assert_eq!(trace.entries(), [".", ".=e"]);
        assert_eq!(e.last_completed().render(), ".");
        assert!(e.current_code().is_empty());
    }

    #[test]
    fn run_loop_returns_when_the_channel_closes() {
        let dispatcher = ActionDispatcher::new(Box::new(NullSynth));
        let mut e = DecoderEngine::new(settings(InputMode::ThreeKey), builtin_store().unwrap(), dispatcher).unwrap();
        let (tx, rx) = mpsc::channel();
        tx.send(BridgeMsg::Switch(SwitchEvent::press(KeyRole::Secondary, Instant::now()))).unwrap();
        drop(tx);

        run_loop(&mut e, &rx);
        assert!(e.is_running());
        assert_eq!(e.current_code().render(), "-");
    }

    #[test]
    fn shutdown_applies_queued_events_then_clears_everything() {
        let trace = Trace::default();
        let dispatcher = ActionDispatcher::new(Box::new(NullSynth));
        let s = settings(InputMode::TwoKey);
        let bindings = s.bindings.clone();
        let mut e = DecoderEngine::new(s, builtin_store().unwrap(), dispatcher)
            .unwrap()
            .with_feedback(Box::new(trace.clone()));
        e.start();

        let (feed, source) = ChannelSource::new();
        feed.send(SourceEvent::Key { key: "SPACE".into(), pressed: true, at: Instant::now() }).unwrap();
        let (tx, rx) = mpsc::channel();
        let mut bridge = EventBridge::spawn(Box::new(source), bindings, tx).unwrap();

        shutdown(&mut e, &mut bridge, &rx);
        assert_eq!(trace.entries(), ["."]);
        assert_eq!(e.next_deadline(), None);
        assert!(e.current_code().is_empty());
        assert!(!e.is_running());
    }

    #[test]
    fn change_mode_rebinds_the_bridge() {
        let dispatcher = ActionDispatcher::new(Box::new(NullSynth));
        let two = settings(InputMode::TwoKey);
        let mut e = DecoderEngine::new(two.clone(), builtin_store().unwrap(), dispatcher).unwrap();
        e.start();

        let (feed, source) = ChannelSource::new();
        let (tx, rx) = mpsc::channel();
        let mut bridge = EventBridge::spawn(Box::new(source), two.bindings, tx).unwrap();

        let mut bad = settings(InputMode::ThreeKey);
        bad.sticky_interval = Duration::ZERO;
        assert!(e.change_mode(bad, &bridge).is_err());
        assert_eq!(e.settings().mode, InputMode::TwoKey);

        e.change_mode(settings(InputMode::ThreeKey), &bridge).unwrap();
        assert_eq!(e.settings().mode, InputMode::ThreeKey);
        feed.send(SourceEvent::Key { key: "RCTRL".into(), pressed: true, at: Instant::now() }).unwrap();
        bridge.stop();
        let roles: Vec<KeyRole> = rx
            .try_iter()
            .filter_map(|m| match m {
                BridgeMsg::Switch(ev) => Some(ev.role),
                BridgeMsg::Quit       => None,
            })
            .collect();
        assert_eq!(roles, [KeyRole::Tertiary]);
    }
}
