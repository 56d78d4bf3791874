// src/output/os.rs  -  OS-level keystroke and pointer injection (rdev)
//
// Characters go out as US-layout key codes, shifted where needed.  rdev only
// moves the pointer to absolute positions, so the backend keeps its own idea
// of where the pointer is, starting at the centre of the main display.

use super::{ClickMode, InputSynth, MouseButton, NamedKey, SynthKey};
use anyhow::{anyhow, Result};
use rdev::{Button, EventType, Key};
use std::time::Duration;

/// macOS drops events that arrive back to back.
#[cfg(target_os = "macos")]
const EVENT_GAP: Duration = Duration::from_millis(20);
#[cfg(not(target_os = "macos"))]
const EVENT_GAP: Duration = Duration::ZERO;

/// Used when the display size cannot be read.
const FALLBACK_DISPLAY: (f64, f64) = (1920.0, 1080.0);

pub struct OsSynth {
    x:      f64,
    y:      f64,
    width:  f64,
    height: f64,
}

impl OsSynth {
    pub fn new() -> Self {
        let (width, height) = match rdev::display_size() {
            Ok((w, h)) => (w as f64, h as f64),
            Err(e) => {
                log::warn!("[os] display size unavailable ({e:?}), assuming {FALLBACK_DISPLAY:?}");
                FALLBACK_DISPLAY
            }
        };
        Self { x: width / 2.0, y: height / 2.0, width, height }
    }

    fn send(&self, event: EventType) -> Result<()> {
        rdev::simulate(&event).map_err(|e| anyhow!("injecting {event:?}: {e:?}"))?;
        if !EVENT_GAP.is_zero() {
            std::thread::sleep(EVENT_GAP);
        }
        Ok(())
    }

    fn tap_char(&self, c: char) -> Result<()> {
        let (key, shifted) = char_key(c).ok_or_else(|| anyhow!("no key for {c:?} on a US layout"))?;
        if shifted {
            self.send(EventType::KeyPress(Key::ShiftLeft))?;
        }
        let typed = self
            .send(EventType::KeyPress(key))
            .and_then(|()| self.send(EventType::KeyRelease(key)));
        if shifted {
            self.send(EventType::KeyRelease(Key::ShiftLeft))?;
        }
        typed
    }

    fn key_of(key: SynthKey) -> Result<Key> {
        match key {
            SynthKey::Named(k) => named_key(k).ok_or_else(|| anyhow!("no OS key for {k:?}")),
            SynthKey::Char(c) => match char_key(c) {
                Some((k, false)) => Ok(k),
                _ => Err(anyhow!("{c:?} cannot be held down")),
            },
        }
    }
}

impl Default for OsSynth {
    fn default() -> Self { Self::new() }
}

impl InputSynth for OsSynth {
    fn name(&self) -> &str { "os" }

    fn press_and_release(&mut self, key: SynthKey) -> Result<()> {
        match key {
            SynthKey::Char(c) => self.tap_char(c),
            SynthKey::Named(_) => {
                let k = Self::key_of(key)?;
                self.send(EventType::KeyPress(k))?;
                self.send(EventType::KeyRelease(k))
            }
        }
    }

    fn press(&mut self, key: SynthKey) -> Result<()> {
        let k = Self::key_of(key)?;
        self.send(EventType::KeyPress(k))
    }

    fn release(&mut self, key: SynthKey) -> Result<()> {
        let k = Self::key_of(key)?;
        self.send(EventType::KeyRelease(k))
    }

    fn move_cursor(&mut self, dx: i32, dy: i32) -> Result<()> {
        let (x, y) = clamp_move((self.x, self.y), (dx, dy), (self.width, self.height));
        self.send(EventType::MouseMove { x, y })?;
        self.x = x;
        self.y = y;
        Ok(())
    }

    fn click(&mut self, button: MouseButton, mode: ClickMode) -> Result<()> {
        let b = match button {
            MouseButton::Left  => Button::Left,
            MouseButton::Right => Button::Right,
        };
        match mode {
            ClickMode::Press   => self.send(EventType::ButtonPress(b)),
            ClickMode::Release => self.send(EventType::ButtonRelease(b)),
            ClickMode::Click   => {
                self.send(EventType::ButtonPress(b))?;
                self.send(EventType::ButtonRelease(b))
            }
            ClickMode::Double  => {
                for _ in 0..2 {
                    self.send(EventType::ButtonPress(b))?;
                    self.send(EventType::ButtonRelease(b))?;
                }
                Ok(())
            }
        }
    }
}

// ── Key tables ────────────────────────────────────────────────────────────────

/// Key plus "needs shift" for a character on a US keyboard.
fn char_key(c: char) -> Option<(Key, bool)> {
    if c.is_ascii_uppercase() {
        return letter_key(c.to_ascii_lowercase()).map(|k| (k, true));
    }
    if let Some(k) = letter_key(c) {
        return Some((k, false));
    }
    let plain = match c {
        '0' => Key::Num0,
        '1' => Key::Num1,
        '2' => Key::Num2,
        '3' => Key::Num3,
        '4' => Key::Num4,
        '5' => Key::Num5,
        '6' => Key::Num6,
        '7' => Key::Num7,
        '8' => Key::Num8,
        '9' => Key::Num9,
        ' ' => Key::Space,
        '.' => Key::Dot,
        ',' => Key::Comma,
        '/' => Key::Slash,
        '-' => Key::Minus,
        '=' => Key::Equal,
        '\'' => Key::Quote,
        ';' => Key::SemiColon,
        '`' => Key::BackQuote,
        '[' => Key::LeftBracket,
        ']' => Key::RightBracket,
        '\\' => Key::BackSlash,
        '\n' => Key::Return,
        '\t' => Key::Tab,
        _ => {
            let shifted = match c {
                '?' => Key::Slash,
                '@' => Key::Num2,
                '(' => Key::Num9,
                ')' => Key::Num0,
                '+' => Key::Equal,
                '!' => Key::Num1,
                ':' => Key::SemiColon,
                '"' => Key::Quote,
                '&' => Key::Num7,
                '$' => Key::Num4,
                '_' => Key::Minus,
                _ => return None,
            };
            return Some((shifted, true));
        }
    };
    Some((plain, false))
}

fn letter_key(c: char) -> Option<Key> {
    const LETTERS: [Key; 26] = [
        Key::KeyA, Key::KeyB, Key::KeyC, Key::KeyD, Key::KeyE, Key::KeyF, Key::KeyG,
        Key::KeyH, Key::KeyI, Key::KeyJ, Key::KeyK, Key::KeyL, Key::KeyM, Key::KeyN,
        Key::KeyO, Key::KeyP, Key::KeyQ, Key::KeyR, Key::KeyS, Key::KeyT, Key::KeyU,
        Key::KeyV, Key::KeyW, Key::KeyX, Key::KeyY, Key::KeyZ,
    ];
    c.is_ascii_lowercase().then(|| LETTERS[(c as u8 - b'a') as usize])
}

fn named_key(k: NamedKey) -> Option<Key> {
    Some(match k {
        NamedKey::Enter     => Key::Return,
        NamedKey::Space     => Key::Space,
        NamedKey::Backspace => Key::Backspace,
        NamedKey::Delete    => Key::Delete,
        NamedKey::Tab       => Key::Tab,
        NamedKey::Escape    => Key::Escape,
        NamedKey::Up        => Key::UpArrow,
        NamedKey::Down      => Key::DownArrow,
        NamedKey::Left      => Key::LeftArrow,
        NamedKey::Right     => Key::RightArrow,
        NamedKey::Home      => Key::Home,
        NamedKey::End       => Key::End,
        NamedKey::PageUp    => Key::PageUp,
        NamedKey::PageDown  => Key::PageDown,
        NamedKey::Insert    => Key::Insert,
        NamedKey::CapsLock  => Key::CapsLock,
        NamedKey::F(n)      => return function_key(n),
        NamedKey::Shift | NamedKey::LShift => Key::ShiftLeft,
        NamedKey::RShift    => Key::ShiftRight,
        NamedKey::Ctrl | NamedKey::LCtrl => Key::ControlLeft,
        NamedKey::RCtrl     => Key::ControlRight,
        NamedKey::Alt       => Key::Alt,
        NamedKey::Windows   => Key::MetaLeft,
    })
}

fn function_key(n: u8) -> Option<Key> {
    const F: [Key; 12] = [
        Key::F1, Key::F2, Key::F3, Key::F4, Key::F5, Key::F6,
        Key::F7, Key::F8, Key::F9, Key::F10, Key::F11, Key::F12,
    ];
    F.get(usize::from(n).checked_sub(1)?).copied()
}

/// Relative move from `at`, kept inside a `size` display.
fn clamp_move(at: (f64, f64), by: (i32, i32), size: (f64, f64)) -> (f64, f64) {
    let x = (at.0 + f64::from(by.0)).clamp(0.0, (size.0 - 1.0).max(0.0));
    let y = (at.1 + f64::from(by.1)).clamp(0.0, (size.1 - 1.0).max(0.0));
    (x, y)
}
