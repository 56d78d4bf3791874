// src/action/dispatch.rs  -  Performs actions against the synthesis and text collaborators
use super::{Outcome, TypeState};
use crate::error::ActionError;
use crate::layout::{KeyStroke, LayoutEntry};
use crate::output::{ClickMode, InputSynth, MouseButton, NamedKey, SynthKey};

/// Owns the collaborators actions act on.  The text state is optional: without
/// one, keystrokes are only synthesized and prediction slots do nothing.
pub struct ActionDispatcher {
    synth:     Box<dyn InputSynth>,
    typestate: Option<TypeState>,
    /// Toggle keys currently pressed.
    held:      Vec<SynthKey>,
}

impl ActionDispatcher {
    pub fn new(synth: Box<dyn InputSynth>) -> Self {
        Self { synth, typestate: None, held: vec![] }
    }

    pub fn with_typestate(mut self, typestate: TypeState) -> Self {
        self.typestate = Some(typestate);
        self
    }

    pub fn synth_name(&self) -> &str { self.synth.name() }
    pub fn typestate(&self) -> Option<&TypeState> { self.typestate.as_ref() }
    pub fn held_keys(&self) -> &[SynthKey] { &self.held }

    pub fn perform(&mut self, action: &super::Action) -> Result<Outcome, ActionError> {
        action.perform(self)
    }

    /// Current prediction list (empty without a text state or predictor).
    pub fn predictions(&mut self) -> Vec<String> {
        self.typestate.as_mut().map(|ts| ts.predictions().to_vec()).unwrap_or_default()
    }

    pub fn label_for(&mut self, entry: &LayoutEntry) -> String {
        let predictions = self.predictions();
        entry.label(&predictions)
    }

    /// Release every latched toggle key.  Failures are logged.
    pub fn release_held(&mut self) {
        for key in self.held.drain(..) {
            match self.synth.release(key) {
                Ok(())  => log::debug!("[dispatch] released held {key}"),
                Err(e)  => log::error!("[dispatch] releasing {key} failed: {e:#}"),
            }
        }
    }

    // ── Variants ──────────────────────────────────────────────────────────────

    pub(crate) fn keystroke(&mut self, stroke: &KeyStroke, abbreviations: bool) -> Result<Outcome, ActionError> {
        if stroke.toggle {
            return self.toggle(stroke.key);
        }
        let synth = self.synth.as_mut();
        let ts = match self.typestate.as_mut() {
            Some(ts) if abbreviations => ts,
            _ => {
                tap(synth, stroke.key)?;
                return Ok(Outcome::Done);
            }
        };

        if stroke.erases() {
            tap(synth, stroke.key)?;
            ts.pop_char();
            return Ok(Outcome::Done);
        }
        let Some(c) = stroke.character else {
            tap(synth, stroke.key)?;
            return Ok(Outcome::Done);
        };

        match ts.trigger() {
            Some(trigger) if trigger == c => {
                if let Some((n, expansion)) = ts.pending_expansion() {
                    // The expansion's trailing space stands in for the trigger.
                    expand(synth, ts, n, &expansion)?;
                } else {
                    tap(synth, stroke.key)?;
                    ts.push_char(c);
                }
            }
            Some(_) => {
                tap(synth, stroke.key)?;
                ts.push_char(c);
            }
            None => {
                tap(synth, stroke.key)?;
                ts.push_char(c);
                if !c.is_whitespace() {
                    if let Some((n, expansion)) = ts.pending_expansion() {
                        expand(synth, ts, n, &expansion)?;
                    }
                }
            }
        }
        Ok(Outcome::Done)
    }

    fn toggle(&mut self, key: SynthKey) -> Result<Outcome, ActionError> {
        if let Some(pos) = self.held.iter().position(|k| *k == key) {
            self.synth.release(key).map_err(ActionError::Synth)?;
            self.held.remove(pos);
            log::debug!("[dispatch] {key} released");
        } else {
            self.synth.press(key).map_err(ActionError::Synth)?;
            self.held.push(key);
            log::debug!("[dispatch] {key} held");
        }
        Ok(Outcome::Done)
    }

    pub(crate) fn pointer_move(&mut self, dx: i32, dy: i32) -> Result<Outcome, ActionError> {
        self.synth.move_cursor(dx, dy).map_err(ActionError::Synth)?;
        Ok(Outcome::Done)
    }

    pub(crate) fn pointer_click(&mut self, button: MouseButton, mode: ClickMode) -> Result<Outcome, ActionError> {
        self.synth.click(button, mode).map_err(ActionError::Synth)?;
        Ok(Outcome::Done)
    }

    /// Replace the word being typed with prediction `slot` plus a space.  Only
    /// the differing tail is erased and retyped.
    pub(crate) fn prediction_select(&mut self, slot: usize) -> Result<Outcome, ActionError> {
        let synth = self.synth.as_mut();
        let Some(ts) = self.typestate.as_mut() else {
            log::debug!("[dispatch] prediction slot {slot}: no text state, ignored");
            return Ok(Outcome::Done);
        };
        let Some(prediction) = ts.predictions().get(slot).cloned() else {
            log::debug!("[dispatch] prediction slot {slot} is empty, ignored");
            return Ok(Outcome::Done);
        };

        let word = ts.current_word().to_string();
        let common = word.chars().zip(prediction.chars()).take_while(|(a, b)| a == b).count();
        let erase = word.chars().count() - common;
        let mut typed: String = prediction.chars().skip(common).collect();
        typed.push(' ');

        erase_chars(synth, ts, erase)?;
        type_text(synth, ts, &typed)?;
        log::debug!("[dispatch] prediction '{prediction}' replaced '{word}'");
        Ok(Outcome::Done)
    }
}

fn tap(synth: &mut dyn InputSynth, key: SynthKey) -> Result<(), ActionError> {
    synth.press_and_release(key).map_err(ActionError::Synth)
}

fn key_for_char(c: char) -> SynthKey {
    match c {
        ' '  => SynthKey::Named(NamedKey::Space),
        '\n' => SynthKey::Named(NamedKey::Enter),
        '\t' => SynthKey::Named(NamedKey::Tab),
        _    => SynthKey::Char(c),
    }
}

// The text state follows each key that actually went out, so a synth
// failure halfway leaves it matching the screen.

fn erase_chars(synth: &mut dyn InputSynth, ts: &mut TypeState, n: usize) -> Result<(), ActionError> {
    for _ in 0..n {
        tap(synth, SynthKey::Named(NamedKey::Backspace))?;
        ts.pop_char();
    }
    Ok(())
}

fn type_text(synth: &mut dyn InputSynth, ts: &mut TypeState, text: &str) -> Result<(), ActionError> {
    for c in text.chars() {
        tap(synth, key_for_char(c))?;
        ts.push_char(c);
    }
    Ok(())
}

/// Erase the `n`-char abbreviation, type its expansion and a space.
fn expand(synth: &mut dyn InputSynth, ts: &mut TypeState, n: usize, expansion: &str) -> Result<(), ActionError> {
    log::debug!("[dispatch] expanding {n}-char abbreviation to '{expansion}'");
    erase_chars(synth, ts, n)?;
    type_text(synth, ts, &format!("{expansion} "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Abbreviations, Action, Predictor};
    use crate::layout::keystroke;
    use anyhow::{anyhow, Result};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder {
        log:  Arc<Mutex<Vec<String>>>,
        fail: bool,
        /// Fail every call once this many have been recorded.
        fail_after: Option<usize>,
    }

    impl Recorder {
        fn entries(&self) -> Vec<String> { self.log.lock().unwrap().clone() }
        fn push(&self, s: String) -> Result<()> {
            let mut log = self.log.lock().unwrap();
            if self.fail || self.fail_after.is_some_and(|n| log.len() >= n) {
                return Err(anyhow!("no display"));
            }
            log.push(s);
            Ok(())
        }
    }

    impl InputSynth for Recorder {
        fn name(&self) -> &str { "recorder" }
        fn press_and_release(&mut self, key: SynthKey) -> Result<()> {
            self.push(match key {
                SynthKey::Char(c) => c.to_string(),
                SynthKey::Named(k) => format!("<{k:?}>"),
            })
        }
        fn press(&mut self, key: SynthKey) -> Result<()> { self.push(format!("down {key}")) }
        fn release(&mut self, key: SynthKey) -> Result<()> { self.push(format!("up {key}")) }
        fn move_cursor(&mut self, dx: i32, dy: i32) -> Result<()> { self.push(format!("move {dx} {dy}")) }
        fn click(&mut self, button: MouseButton, mode: ClickMode) -> Result<()> {
            self.push(format!("{mode:?} {button:?}"))
        }
    }

    struct Fixed(Vec<&'static str>);

    impl Predictor for Fixed {
        fn predict(&mut self, _past: &str) -> Result<Vec<String>> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    fn key(name: &str, dictation: bool) -> Action {
        Action::Keystroke { stroke: keystroke(name).unwrap(), abbreviations: dictation }
    }

    fn dictation(rec: &Recorder, trigger: Option<char>) -> ActionDispatcher {
        let abbr: Abbreviations = [("brb", "be right back")].into_iter().collect();
        ActionDispatcher::new(Box::new(rec.clone())).with_typestate(TypeState::new(abbr, trigger))
    }

    #[test]
    fn abbreviation_expands_on_trigger() {
        let rec = Recorder::default();
        let mut d = dictation(&rec, Some(' '));
        for name in ["B", "R", "B", "SPACE"] {
            assert_eq!(d.perform(&key(name, true)).unwrap(), Outcome::Done);
        }
        let typed: String = rec.entries().iter().map(|s| s.as_str()).collect::<Vec<_>>().join("|");
        assert_eq!(
            typed,
            "b|r|b|<Backspace>|<Backspace>|<Backspace>|b|e|<Space>|r|i|g|h|t|<Space>|b|a|c|k|<Space>"
        );
        assert_eq!(d.typestate().unwrap().past_stream(), "be right back ");
    }

    #[test]
    fn abbreviation_without_trigger_expands_immediately() {
        let rec = Recorder::default();
        let mut d = dictation(&rec, None);
        for name in ["B", "R", "B"] {
            d.perform(&key(name, true)).unwrap();
        }
        assert_eq!(d.typestate().unwrap().past_stream(), "be right back ");
    }

    #[test]
    fn backspace_pops_text() {
        let rec = Recorder::default();
        let mut d = dictation(&rec, Some(' '));
        d.perform(&key("H", true)).unwrap();
        d.perform(&key("I", true)).unwrap();
        d.perform(&key("BACKSPACE", true)).unwrap();
        assert_eq!(d.typestate().unwrap().past_stream(), "h");
        assert_eq!(rec.entries().last().unwrap(), "<Backspace>");
    }

    #[test]
    fn non_dictation_keystrokes_leave_text_alone() {
        let rec = Recorder::default();
        let mut d = dictation(&rec, Some(' '));
        d.perform(&key("X", false)).unwrap();
        assert_eq!(d.typestate().unwrap().past_stream(), "");
        assert_eq!(rec.entries(), vec!["x"]);
    }

    #[test]
    fn modifiers_latch_and_release_on_request() {
        let rec = Recorder::default();
        let mut d = ActionDispatcher::new(Box::new(rec.clone()));
        d.perform(&key("SHIFT", false)).unwrap();
        d.perform(&key("CTRL", false)).unwrap();
        d.perform(&key("SHIFT", false)).unwrap();
        assert_eq!(d.held_keys(), &[SynthKey::Named(NamedKey::Ctrl)]);
        d.release_held();
        assert!(d.held_keys().is_empty());
        assert_eq!(rec.entries(), vec!["down Shift", "down Ctrl", "up Shift", "up Ctrl"]);
    }

    #[test]
    fn prediction_replaces_current_word() {
        let rec = Recorder::default();
        let ts = TypeState::new(Abbreviations::new(), Some(' '))
            .with_predictor(Box::new(Fixed(vec!["hello", "help"])));
        let mut d = ActionDispatcher::new(Box::new(rec.clone())).with_typestate(ts);
        for name in ["H", "E", "X"] {
            d.perform(&key(name, true)).unwrap();
        }
        assert_eq!(d.predictions(), vec!["hello".to_string(), "help".to_string()]);
        d.perform(&Action::PredictionSelect { slot: 1 }).unwrap();
        assert_eq!(d.typestate().unwrap().past_stream(), "help ");
        assert_eq!(&rec.entries()[3..], ["<Backspace>", "l", "p", "<Space>"]);
    }

    #[test]
    fn missing_collaborators_are_no_ops() {
        let rec = Recorder::default();
        let mut d = ActionDispatcher::new(Box::new(rec.clone()));
        assert_eq!(d.perform(&Action::PredictionSelect { slot: 0 }).unwrap(), Outcome::Done);
        d.perform(&key("A", true)).unwrap();
        assert_eq!(rec.entries(), vec!["a"]);

        let mut d = dictation(&rec, Some(' '));
        assert_eq!(d.perform(&Action::PredictionSelect { slot: 5 }).unwrap(), Outcome::Done);
    }

    #[test]
    fn layout_and_repeat_actions_report_outcomes() {
        let mut d = ActionDispatcher::new(Box::new(Recorder::default()));
        assert_eq!(
            d.perform(&Action::ChangeLayout { target: "mouse".into() }).unwrap(),
            Outcome::SwitchLayout("mouse".into())
        );
        assert_eq!(d.perform(&Action::RepeatToggle).unwrap(), Outcome::EnableRepeat);
    }

    #[test]
    fn text_follows_the_keys_sent_before_a_failed_expansion() {
        let rec = Recorder { fail_after: Some(7), ..Recorder::default() };
        let mut d = dictation(&rec, Some(' '));
        for name in ["B", "R", "B"] {
            d.perform(&key(name, true)).unwrap();
        }
        assert!(d.perform(&key("SPACE", true)).is_err());
        assert_eq!(rec.entries()[3..], ["<Backspace>", "<Backspace>", "<Backspace>", "b"]);
        assert_eq!(d.typestate().unwrap().past_stream(), "b");
    }

    #[test]
    fn text_follows_the_keys_sent_before_a_failed_prediction() {
        let rec = Recorder { fail_after: Some(5), ..Recorder::default() };
        let ts = TypeState::new(Abbreviations::new(), Some(' '))
            .with_predictor(Box::new(Fixed(vec!["hello", "help"])));
        let mut d = ActionDispatcher::new(Box::new(rec.clone())).with_typestate(ts);
        for name in ["H", "E", "X"] {
            d.perform(&key(name, true)).unwrap();
        }
        assert!(d.perform(&Action::PredictionSelect { slot: 1 }).is_err());
        assert_eq!(d.typestate().unwrap().past_stream(), "hel");
    }

    #[test]
    fn synth_failure_is_an_action_error() {
        let rec = Recorder { fail: true, ..Recorder::default() };
        let mut d = ActionDispatcher::new(Box::new(rec));
        let err = d.perform(&Action::PointerMove { dx: 5, dy: 0 }).unwrap_err();
        assert!(err.to_string().contains("no display"));
    }
}
