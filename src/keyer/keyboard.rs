// src/keyer/keyboard.rs  -  Terminal keyboard as switch source (crossterm)
//
// Raw mode keeps the terminal from echoing or acting on the keys, so every
// key the source reads is consumed.  Release events only exist when the
// terminal speaks the keyboard enhancement protocol (kitty, foot, WezTerm,
// recent alacritty); elsewhere a press is followed by a synthetic release at
// the same instant, which is fine for two/three switches but makes one-key
// mode see dits only.
//
// Esc and Ctrl+C ask for shutdown unless Esc is itself a bound switch.

use super::{normalize_key_name, SourceEvent, SwitchSource};
use anyhow::{Context, Result};
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    ModifierKeyCode, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};
use std::collections::VecDeque;
use std::io::stdout;
use std::time::{Duration, Instant};

pub struct KeyboardSource {
    subscribed: Vec<String>,
    active:     bool,
    enhanced:   bool,
    /// Synthetic releases waiting to be reported.
    pending:    VecDeque<SourceEvent>,
}

impl KeyboardSource {
    pub fn new() -> Self {
        Self { subscribed: vec![], active: false, enhanced: false, pending: VecDeque::new() }
    }

    fn enter(&mut self) -> Result<()> {
        if self.active {
            return Ok(());
        }
        terminal::enable_raw_mode().context("enabling terminal raw mode")?;
        self.enhanced = terminal::supports_keyboard_enhancement().unwrap_or(false);
        if self.enhanced {
            execute!(
                stdout(),
                PushKeyboardEnhancementFlags(
                    KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                        | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
                        | KeyboardEnhancementFlags::REPORT_ALL_KEYS_AS_ESCAPE_CODES
                )
            )
            .context("enabling keyboard enhancement")?;
        } else {
            log::warn!("[keyboard] terminal does not report key releases; presses get an immediate release");
        }
        self.active = true;
        Ok(())
    }

    fn leave(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        if self.enhanced {
            execute!(stdout(), PopKeyboardEnhancementFlags)?;
        }
        terminal::disable_raw_mode().context("leaving terminal raw mode")
    }

    fn translate(&mut self, key: KeyEvent, at: Instant) -> Option<SourceEvent> {
        let pressed = match key.kind {
            KeyEventKind::Press   => true,
            KeyEventKind::Release => false,
            KeyEventKind::Repeat  => return None,
        };
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return pressed.then_some(SourceEvent::Quit);
        }
        let name = key_name(key.code)?;
        if !self.subscribed.contains(&name) {
            if pressed && name == "ESCAPE" {
                return Some(SourceEvent::Quit);
            }
            return None;
        }
        if pressed && !self.enhanced {
            self.pending.push_back(SourceEvent::Key { key: name.clone(), pressed: false, at });
        }
        Some(SourceEvent::Key { key: name, pressed, at })
    }
}

impl Default for KeyboardSource {
    fn default() -> Self { Self::new() }
}

impl SwitchSource for KeyboardSource {
    fn name(&self) -> &str { "keyboard" }

    fn subscribe(&mut self, keys: &[String]) -> Result<()> {
        self.enter()?;
        self.subscribed = keys.iter().map(|k| normalize_key_name(k)).collect();
        self.pending.clear();
        Ok(())
    }

    fn next_event(&mut self, timeout: Duration) -> Result<Option<SourceEvent>> {
        if let Some(ev) = self.pending.pop_front() {
            return Ok(Some(ev));
        }
        if !event::poll(timeout)? {
            return Ok(None);
        }
        let at = Instant::now();
        match event::read()? {
            Event::Key(key) => Ok(self.translate(key, at)),
            _ => Ok(None),
        }
    }

    fn unsubscribe(&mut self) -> Result<()> {
        self.subscribed.clear();
        self.pending.clear();
        self.leave()
    }
}

impl Drop for KeyboardSource {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

/// Name of a terminal key in the layout key table's spelling.
pub fn key_name(code: KeyCode) -> Option<String> {
    let name = match code {
        KeyCode::Char(' ')   => "SPACE".into(),
        KeyCode::Char(c) if c.is_ascii_digit() => digit_name(c)?.into(),
        KeyCode::Char(c)     => c.to_uppercase().collect(),
        KeyCode::Enter       => "ENTER".into(),
        KeyCode::Tab         => "TAB".into(),
        KeyCode::Backspace   => "BACKSPACE".into(),
        KeyCode::Delete      => "DELETE".into(),
        KeyCode::Esc         => "ESCAPE".into(),
        KeyCode::Up          => "UP".into(),
        KeyCode::Down        => "DOWN".into(),
        KeyCode::Left        => "LEFT".into(),
        KeyCode::Right       => "RIGHT".into(),
        KeyCode::Home        => "HOME".into(),
        KeyCode::End         => "END".into(),
        KeyCode::PageUp      => "PAGEUP".into(),
        KeyCode::PageDown    => "PAGEDOWN".into(),
        KeyCode::CapsLock    => "CAPSLOCK".into(),
        KeyCode::F(n)        => format!("F{n}"),
        KeyCode::Modifier(m) => match m {
            ModifierKeyCode::LeftControl  => "LCTRL",
            ModifierKeyCode::RightControl => "RCTRL",
            ModifierKeyCode::LeftShift    => "LSHIFT",
            ModifierKeyCode::RightShift   => "RSHIFT",
            ModifierKeyCode::LeftAlt | ModifierKeyCode::RightAlt => "ALT",
            ModifierKeyCode::LeftSuper | ModifierKeyCode::RightSuper => "WINDOWS",
            _ => return None,
        }
        .into(),
        _ => return None,
    };
    Some(name)
}

fn digit_name(c: char) -> Option<&'static str> {
    Some(match c {
        '1' => "ONE",   '2' => "TWO",   '3' => "THREE", '4' => "FOUR", '5' => "FIVE",
        '6' => "SIX",   '7' => "SEVEN", '8' => "EIGHT", '9' => "NINE", '0' => "ZERO",
        _ => return None,
    })
}
