// src/layout/keys.rs  -  Named keystrokes and pointer commands usable in layouts
use crate::action::Action;
use crate::output::{ClickMode, MouseButton, NamedKey, SynthKey};

/// A synthesizable key as layouts name it (`A`, `SEVEN`, `QUESTION`, `ENTER`, …).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStroke {
    pub name:      String,
    pub label:     String,
    pub key:       SynthKey,
    /// Text the key produces, tracked for abbreviations and predictions.
    pub character: Option<char>,
    /// Modifier keys latch: one perform presses, the next releases.
    pub toggle:    bool,
}

impl KeyStroke {
    fn char_key(name: &str, c: char) -> Self {
        Self { name: name.into(), label: c.to_string(), key: SynthKey::Char(c), character: Some(c), toggle: false }
    }

    fn named(name: &str, label: &str, key: NamedKey, character: Option<char>) -> Self {
        Self {
            name:   name.into(),
            label:  label.into(),
            key:    SynthKey::Named(key),
            character,
            toggle: key.is_modifier(),
        }
    }

    /// Backspace and delete remove text instead of adding it.
    pub fn erases(&self) -> bool {
        matches!(self.key, SynthKey::Named(NamedKey::Backspace | NamedKey::Delete))
    }
}

const DIGITS: [(&str, char); 10] = [
    ("ONE", '1'), ("TWO", '2'), ("THREE", '3'), ("FOUR", '4'), ("FIVE", '5'),
    ("SIX", '6'), ("SEVEN", '7'), ("EIGHT", '8'), ("NINE", '9'), ("ZERO", '0'),
];

const PUNCTUATION: [(&str, char); 25] = [
    ("DOT", '.'),          ("COMMA", ','),        ("QUESTION", '?'),    ("EXCLAMATION", '!'),
    ("COLON", ':'),        ("SEMICOLON", ';'),    ("AT", '@'),          ("HASH", '#'),
    ("DOLLAR", '$'),       ("PERCENT", '%'),      ("AMPERSAND", '&'),   ("STAR", '*'),
    ("PLUS", '+'),         ("MINUS", '-'),        ("EQUALS", '='),      ("FSLASH", '/'),
    ("BSLASH", '\\'),      ("SINGLEQUOTE", '\''), ("DOUBLEQUOTE", '"'), ("OPENBRACKET", '('),
    ("CLOSEBRACKET", ')'), ("LESSTHAN", '<'),     ("MORETHAN", '>'),    ("CIRCONFLEX", '^'),
    ("UNDERSCORE", '_'),
];

/// Look up a keystroke by its table name (case-insensitive).
pub fn keystroke(name: &str) -> Option<KeyStroke> {
    let name = name.trim().to_uppercase();
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_uppercase() {
            return Some(KeyStroke::char_key(&name, c.to_ascii_lowercase()));
        }
    }
    if let Some(&(_, c)) = DIGITS.iter().chain(PUNCTUATION.iter()).find(|(n, _)| *n == name) {
        return Some(KeyStroke::char_key(&name, c));
    }
    if let Some(n) = name.strip_prefix('F').and_then(|n| n.parse::<u8>().ok()) {
        if (1..=12).contains(&n) {
            return Some(KeyStroke::named(&name, &name, NamedKey::F(n), None));
        }
    }
    use NamedKey::*;
    let (label, key, character) = match name.as_str() {
        "ENTER"      => ("enter", Enter, Some('\n')),
        "SPACE"      => ("space", Space, Some(' ')),
        "BACKSPACE"  => ("bckspc", Backspace, None),
        "DELETE"     => ("del", Delete, None),
        "TAB"        => ("tab", Tab, Some('\t')),
        "ESCAPE"     => ("esc", Escape, None),
        "UPARROW"    => ("up", Up, None),
        "DOWNARROW"  => ("down", Down, None),
        "LEFTARROW"  => ("left", Left, None),
        "RIGHTARROW" => ("right", Right, None),
        "HOME"       => ("home", Home, None),
        "END"        => ("end", End, None),
        "PAGEUP"     => ("pageup", PageUp, None),
        "PAGEDOWN"   => ("pagedwn", PageDown, None),
        "INSERT"     => ("insert", Insert, None),
        "CAPSLOCK"   => ("caps", CapsLock, None),
        "SHIFT"      => ("shift", Shift, None),
        "LSHIFT"     => ("lshift", LShift, None),
        "RSHIFT"     => ("rshift", RShift, None),
        "CTRL"       => ("ctrl", Ctrl, None),
        "LCTRL"      => ("lctrl", LCtrl, None),
        "RCTRL"      => ("rctrl", RCtrl, None),
        "ALT"        => ("alt", Alt, None),
        "WINDOWS"    => ("win", Windows, None),
        _ => return None,
    };
    Some(KeyStroke::named(&name, label, key, character))
}

/// The keystroke that types `c`, if the table has one.
pub fn keystroke_for_char(c: char) -> Option<KeyStroke> {
    if c.is_ascii_alphabetic() {
        return keystroke(&c.to_ascii_uppercase().to_string());
    }
    if c == ' ' {
        return keystroke("SPACE");
    }
    DIGITS
        .iter()
        .chain(PUNCTUATION.iter())
        .find(|(_, ch)| *ch == c)
        .and_then(|(name, _)| keystroke(name))
}

/// Pointer step classes in pixels.
pub const POINTER_STEPS: [i32; 3] = [5, 40, 250];

/// Pointer command by table name: `MOUSE<DIR><STEP>` moves, plus the click
/// commands.  Returns the action and its display label.
pub fn pointer(name: &str) -> Option<(Action, String)> {
    let name = name.trim().to_uppercase();
    let click = |button, mode, label: &str| Some((Action::PointerClick { button, mode }, label.to_string()));
    match name.as_str() {
        "MOUSECLICKLEFT"     => return click(MouseButton::Left, ClickMode::Click, "ms clkleft"),
        "MOUSECLICKRIGHT"    => return click(MouseButton::Right, ClickMode::Click, "ms clkright"),
        "MOUSEDBLCLICKLEFT"  => return click(MouseButton::Left, ClickMode::Double, "ms dblclkleft"),
        "MOUSEDBLCLICKRIGHT" => return click(MouseButton::Right, ClickMode::Double, "ms dblclkright"),
        "MOUSECLKHLDLEFT"    => return click(MouseButton::Left, ClickMode::Press, "ms hldleft"),
        "MOUSECLKHLDRIGHT"   => return click(MouseButton::Right, ClickMode::Press, "ms hldright"),
        "MOUSERELEASEHOLD"   => return click(MouseButton::Left, ClickMode::Release, "ms release"),
        _ => {}
    }

    let rest = name.strip_prefix("MOUSE")?;
    const DIRECTIONS: [(&str, i32, i32, &str); 8] = [
        ("UPLEFT", -1, -1, "leftup"),     ("UPRIGHT", 1, -1, "rightup"),
        ("DOWNLEFT", -1, 1, "leftdown"),  ("DOWNRIGHT", 1, 1, "rightdown"),
        ("UP", 0, -1, "up"),              ("DOWN", 0, 1, "down"),
        ("LEFT", -1, 0, "left"),          ("RIGHT", 1, 0, "right"),
    ];
    let (step, (sx, sy, label)) = DIRECTIONS.iter().find_map(|&(dir, sx, sy, label)| {
        let step: i32 = rest.strip_prefix(dir)?.parse().ok()?;
        Some((step, (sx, sy, label)))
    })?;
    if !POINTER_STEPS.contains(&step) {
        return None;
    }
    Some((Action::PointerMove { dx: sx * step, dy: sy * step }, format!("ms {label} {step}")))
}

/// Action for a plain table name: a keystroke or a pointer command.
/// `abbreviations` marks keystrokes that feed the typed-text state.
pub fn named_action(name: &str, abbreviations: bool) -> Option<(Action, String)> {
    if let Some(stroke) = keystroke(name) {
        let label = stroke.label.clone();
        return Some((Action::Keystroke { stroke, abbreviations }, label));
    }
    pointer(name)
}
