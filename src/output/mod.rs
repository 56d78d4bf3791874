// src/output/mod.rs  -  InputSynth trait (keystroke / pointer synthesis) + backends
use crate::config::OutputKind;
use anyhow::Result;
use std::fmt;

#[cfg(feature = "keyboard")]
mod terminal;
#[cfg(feature = "keyboard")]
pub use terminal::TerminalSynth;

#[cfg(feature = "os-input")]
mod os;
#[cfg(feature = "os-input")]
pub use os::OsSynth;

/// Non-character keys the layouts can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Enter,
    Space,
    Backspace,
    Delete,
    Tab,
    Escape,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    CapsLock,
    F(u8),
    Shift,
    LShift,
    RShift,
    Ctrl,
    LCtrl,
    RCtrl,
    Alt,
    Windows,
}

impl NamedKey {
    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            NamedKey::Shift | NamedKey::LShift | NamedKey::RShift
                | NamedKey::Ctrl | NamedKey::LCtrl | NamedKey::RCtrl
                | NamedKey::Alt | NamedKey::Windows
        )
    }
}

/// A key as the synthesis backend sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SynthKey {
    Char(char),
    Named(NamedKey),
}

impl fmt::Display for SynthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthKey::Char(c)  => write!(f, "{c}"),
            SynthKey::Named(k) => write!(f, "{k:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClickMode {
    Click,
    Double,
    /// Press and keep holding (drag).
    Press,
    /// Release a held button.
    Release,
}

/// OS input-synthesis boundary.  Calls are fire-and-forget from the engine's
/// point of view; an `Err` only gets logged.
pub trait InputSynth: Send {
    fn name(&self) -> &str;
    fn press_and_release(&mut self, key: SynthKey) -> Result<()>;
    fn press(&mut self, key: SynthKey) -> Result<()>;
    fn release(&mut self, key: SynthKey) -> Result<()>;
    fn move_cursor(&mut self, dx: i32, dy: i32) -> Result<()>;
    fn click(&mut self, button: MouseButton, mode: ClickMode) -> Result<()>;
}

/// Null backend (logs only, for tests and `--check-switches`)
pub struct NullSynth;

impl InputSynth for NullSynth {
    fn name(&self) -> &str { "null" }
    fn press_and_release(&mut self, key: SynthKey) -> Result<()> {
        log::debug!("[synth] tap {key}");
        Ok(())
    }
    fn press(&mut self, key: SynthKey) -> Result<()> {
        log::debug!("[synth] press {key}");
        Ok(())
    }
    fn release(&mut self, key: SynthKey) -> Result<()> {
        log::debug!("[synth] release {key}");
        Ok(())
    }
    fn move_cursor(&mut self, dx: i32, dy: i32) -> Result<()> {
        log::debug!("[synth] move {dx:+},{dy:+}");
        Ok(())
    }
    fn click(&mut self, button: MouseButton, mode: ClickMode) -> Result<()> {
        log::debug!("[synth] {mode:?} {button:?}");
        Ok(())
    }
}

/// Factory with cfg fallbacks: a backend that is not compiled in falls
/// back to [`NullSynth`] with a warning.  `Auto` means the OS backend when
/// it is available.
pub fn create_synth(kind: OutputKind) -> Box<dyn InputSynth> {
    match kind {
        OutputKind::Auto => {
            #[cfg(feature = "os-input")]
            return Box::new(OsSynth::new());
            #[cfg(not(feature = "os-input"))]
            log::info!("[synth] built without `os-input`, keys are only logged (--output echo shows them)");
        }
        OutputKind::Os => {
            #[cfg(feature = "os-input")]
            return Box::new(OsSynth::new());
            #[cfg(not(feature = "os-input"))]
            log::warn!("OS output needs the `os-input` feature  →  using NullSynth");
        }
        OutputKind::Echo => {
            #[cfg(feature = "keyboard")]
            return Box::new(TerminalSynth::new());
            #[cfg(not(feature = "keyboard"))]
            log::warn!("terminal output needs the `keyboard` feature  →  using NullSynth");
        }
        OutputKind::None => {}
    }
    Box::new(NullSynth)
}
