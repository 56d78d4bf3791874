// src/output/terminal.rs  -  Echo synthesized input to the terminal (crossterm)
//
// Stands in for OS-level injection: characters are printed, editing keys
// edit the current line, everything else is shown as a [TOKEN].  Works in
// raw mode, so lines end with "\r\n".

use super::{ClickMode, InputSynth, MouseButton, NamedKey, SynthKey};
use anyhow::Result;
use crossterm::cursor::MoveLeft;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use crossterm::{execute, queue};
use std::io::{stdout, Write};

pub struct TerminalSynth {
    /// Chars on the current output line, for backspace.
    column: u16,
}

impl TerminalSynth {
    pub fn new() -> Self { Self { column: 0 } }

    fn print(&mut self, text: &str) -> Result<()> {
        let mut out = stdout();
        queue!(out, Print(text))?;
        out.flush()?;
        self.column = self.column.saturating_add(text.chars().count() as u16);
        Ok(())
    }

    fn newline(&mut self) -> Result<()> {
        execute!(stdout(), Print("\r\n"))?;
        self.column = 0;
        Ok(())
    }

    fn erase_left(&mut self) -> Result<()> {
        if self.column == 0 {
            return Ok(());
        }
        execute!(stdout(), MoveLeft(1), Clear(ClearType::UntilNewLine))?;
        self.column -= 1;
        Ok(())
    }
}

impl Default for TerminalSynth {
    fn default() -> Self { Self::new() }
}

impl InputSynth for TerminalSynth {
    fn name(&self) -> &str { "terminal" }

    fn press_and_release(&mut self, key: SynthKey) -> Result<()> {
        match key {
            SynthKey::Char(c)                    => self.print(c.encode_utf8(&mut [0u8; 4])),
            SynthKey::Named(NamedKey::Space)     => self.print(" "),
            SynthKey::Named(NamedKey::Enter)     => self.newline(),
            SynthKey::Named(NamedKey::Backspace) => self.erase_left(),
            SynthKey::Named(NamedKey::Tab)       => self.print("\t"),
            SynthKey::Named(k)                   => self.print(&format!("[{k:?}]")),
        }
    }

    fn press(&mut self, key: SynthKey) -> Result<()> {
        self.print(&format!("[{key}↓]"))
    }

    fn release(&mut self, key: SynthKey) -> Result<()> {
        self.print(&format!("[{key}↑]"))
    }

    fn move_cursor(&mut self, dx: i32, dy: i32) -> Result<()> {
        self.print(&format!("[mouse {dx:+},{dy:+}]"))
    }

    fn click(&mut self, button: MouseButton, mode: ClickMode) -> Result<()> {
        self.print(&format!("[{mode:?} {button:?}]"))
    }
}
