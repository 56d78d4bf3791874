// src/layout/builtin.rs  -  Layouts used when no layout file is configured
use super::keys::{keystroke_for_char, named_action};
use super::{Layout, LayoutEntry, LayoutStore};
use crate::action::Action;
use crate::error::LayoutError;
use crate::morse::table::{itu_code, ITU_CHARS};
use crate::morse::CodeBuffer;

pub const TYPING: &str = "typing";
pub const MOUSE: &str = "mouse";

/// Both built-in layouts, `typing` active.
pub fn builtin_store() -> Result<LayoutStore, LayoutError> {
    LayoutStore::new(vec![typing()?, mouse()?], TYPING)
}

/// ITU letters, digits and punctuation plus editing keys, repeat,
/// three prediction slots and a switch to the mouse layout.
pub fn typing() -> Result<Layout, LayoutError> {
    let mut entries = Vec::new();
    for c in ITU_CHARS.chars() {
        let (Some(code), Some(stroke)) = (itu_code(c), keystroke_for_char(c)) else { continue };
        let label = stroke.label.clone();
        entries.push(entry(TYPING, code, label, Action::Keystroke { stroke, abbreviations: true })?);
    }
    for (code, name) in [("..--", "SPACE"), ("----", "BACKSPACE"), (".-.-", "ENTER")] {
        if let Some((action, label)) = named_action(name, true) {
            entries.push(entry(TYPING, code, label, action)?);
        }
    }
    entries.push(entry(TYPING, "---.", "repeat", Action::RepeatToggle)?);
    for (slot, code) in ["...-.", "..-..", ".-..."].into_iter().enumerate() {
        entries.push(entry(TYPING, code, "", Action::PredictionSelect { slot })?);
    }
    entries.push(entry(TYPING, ".--.-", MOUSE, Action::ChangeLayout { target: MOUSE.into() })?);
    Layout::new(TYPING, true, entries)
}

/// Pointer moves in the 5/40/250 px step classes, clicks and drag.
pub fn mouse() -> Result<Layout, LayoutError> {
    const ITEMS: [(&str, &str); 17] = [
        (".",    "MOUSEUP5"),         ("-",    "MOUSEDOWN5"),
        ("..",   "MOUSELEFT5"),       ("--",   "MOUSERIGHT5"),
        (".-",   "MOUSEUP40"),        ("-.",   "MOUSEDOWN40"),
        ("...",  "MOUSELEFT40"),      ("---",  "MOUSERIGHT40"),
        ("..-",  "MOUSEUP250"),       ("--.",  "MOUSEDOWN250"),
        (".-.",  "MOUSELEFT250"),     ("-.-",  "MOUSERIGHT250"),
        (".--",  "MOUSECLICKLEFT"),   ("-..",  "MOUSECLICKRIGHT"),
        ("....", "MOUSEDBLCLICKLEFT"),("..-.", "MOUSECLKHLDLEFT"),
        (".-..", "MOUSERELEASEHOLD"),
    ];
    let mut entries = Vec::with_capacity(ITEMS.len() + 2);
    for (code, name) in ITEMS {
        if let Some((action, label)) = named_action(name, false) {
            entries.push(entry(MOUSE, code, label, action)?);
        }
    }
    entries.push(entry(MOUSE, "---.", "repeat", Action::RepeatToggle)?);
    entries.push(entry(MOUSE, ".--.-", TYPING, Action::ChangeLayout { target: TYPING.into() })?);
    Layout::new(MOUSE, false, entries)
}

fn entry(layout: &str, code: &str, label: impl Into<String>, action: Action) -> Result<LayoutEntry, LayoutError> {
    let code = CodeBuffer::parse(code).ok_or_else(|| LayoutError::InvalidCode {
        layout: layout.into(),
        code:   code.into(),
    })?;
    Ok(LayoutEntry::new(code, label, action))
}
