// src/keyer/mod.rs  -  Switch roles, key bindings, SwitchSource trait + source registry
pub mod bridge;
pub mod channel;
#[cfg(feature = "keyboard")]
pub mod keyboard;
#[cfg(feature = "switch-midi")]
pub mod midi;
#[cfg(feature = "switch-vband")]
pub mod vband;

pub use bridge::{BridgeMsg, EventBridge};
pub use channel::ChannelSource;

use crate::config::SourceKind;
use crate::error::ConfigError;
use crate::morse::InputMode;
use anyhow::Result;
use std::fmt;
use std::time::{Duration, Instant};

// ── Roles ─────────────────────────────────────────────────────────────────────

/// Logical switch role.  Primary exists in every mode, Secondary from two
/// switches on, Tertiary only with three switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyRole {
    Primary,
    Secondary,
    Tertiary,
}

impl KeyRole {
    pub const ALL: [KeyRole; 3] = [KeyRole::Primary, KeyRole::Secondary, KeyRole::Tertiary];

    pub fn index(self) -> usize {
        match self {
            KeyRole::Primary   => 0,
            KeyRole::Secondary => 1,
            KeyRole::Tertiary  => 2,
        }
    }

    /// Name of the `[input]` config key that binds this role.
    pub fn config_key(self) -> &'static str {
        match self {
            KeyRole::Primary   => "key_one",
            KeyRole::Secondary => "key_two",
            KeyRole::Tertiary  => "key_three",
        }
    }
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeyRole::Primary   => "primary",
            KeyRole::Secondary => "secondary",
            KeyRole::Tertiary  => "tertiary",
        })
    }
}

// ── Physical key names ────────────────────────────────────────────────────────

/// Canonical spelling of a physical key name: upper case, with the common
/// aliases folded (`right ctrl` → `RCTRL`, `return` → `ENTER`, `" "` → `SPACE`).
/// Two bindings are the same key exactly when their normalised names match.
pub fn normalize_key_name(name: &str) -> String {
    if name == " " {
        return "SPACE".into();
    }
    let upper = name.trim().to_uppercase();
    let compact: String = upper.chars().filter(|c| !matches!(c, ' ' | '_' | '-')).collect();
    let alias = match compact.as_str() {
        "RCTRL" | "RIGHTCTRL" | "RCONTROL" | "RIGHTCONTROL"   => "RCTRL",
        "LCTRL" | "LEFTCTRL" | "LCONTROL" | "LEFTCONTROL"     => "LCTRL",
        "CTRL" | "CONTROL"                                    => "CTRL",
        "RSHIFT" | "RIGHTSHIFT"                               => "RSHIFT",
        "LSHIFT" | "LEFTSHIFT"                                => "LSHIFT",
        "ENTER" | "RETURN"                                    => "ENTER",
        "SPACE" | "SPACEBAR"                                  => "SPACE",
        "ESC" | "ESCAPE"                                      => "ESCAPE",
        "DEL" | "DELETE"                                      => "DELETE",
        "BKSP" | "BACKSPACE"                                  => "BACKSPACE",
        "WIN" | "WINDOWS" | "SUPER" | "META"                  => "WINDOWS",
        "PGUP" | "PAGEUP"                                     => "PAGEUP",
        "PGDN" | "PAGEDOWN"                                   => "PAGEDOWN",
        _ => "",
    };
    if alias.is_empty() {
        upper.split_whitespace().collect::<Vec<_>>().join("_")
    } else {
        alias.into()
    }
}

/// Role → physical key mapping for one input mode.  Only the roles the mode
/// uses are bound, and no two of them share a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBindings {
    keys: Vec<(KeyRole, String)>,
}

impl KeyBindings {
    /// `names` holds the configured key for Primary, Secondary and Tertiary in
    /// that order; entries for roles the mode does not use are ignored.
    pub fn for_mode(mode: InputMode, names: [&str; 3]) -> Result<Self, ConfigError> {
        let mut keys: Vec<(KeyRole, String)> = Vec::with_capacity(3);
        for &role in mode.roles() {
            let key = normalize_key_name(names[role.index()]);
            if key.is_empty() {
                return Err(ConfigError::MissingBinding(role));
            }
            if let Some((first, _)) = keys.iter().find(|(_, k)| *k == key) {
                return Err(ConfigError::DuplicateBinding { first: *first, second: role, key });
            }
            keys.push((role, key));
        }
        Ok(Self { keys })
    }

    pub fn role_of(&self, key: &str) -> Option<KeyRole> {
        let key = normalize_key_name(key);
        self.keys.iter().find(|(_, k)| *k == key).map(|(r, _)| *r)
    }

    pub fn key_for(&self, role: KeyRole) -> Option<&str> {
        self.keys.iter().find(|(r, _)| *r == role).map(|(_, k)| k.as_str())
    }

    /// Bound key names, in role order.
    pub fn keys(&self) -> Vec<String> {
        self.keys.iter().map(|(_, k)| k.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (KeyRole, &str)> {
        self.keys.iter().map(|(r, k)| (*r, k.as_str()))
    }
}

// ── Events ────────────────────────────────────────────────────────────────────

/// Role-tagged switch edge, as delivered to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchEvent {
    pub role:    KeyRole,
    pub pressed: bool,
    pub at:      Instant,
}

impl SwitchEvent {
    pub fn press(role: KeyRole, at: Instant) -> Self { Self { role, pressed: true, at } }
    pub fn release(role: KeyRole, at: Instant) -> Self { Self { role, pressed: false, at } }
}

/// Raw notification from a hardware source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    Key { key: String, pressed: bool, at: Instant },
    /// The user asked to leave (Esc / Ctrl+C on the keyboard source).
    Quit,
}

/// Hardware event source.  A source only reports the keys it is subscribed to
/// and consumes them, so the subscribed keys never reach other applications
/// through this source.
pub trait SwitchSource: Send {
    fn name(&self) -> &str;
    /// Replace the current subscription with `keys` (normalised names).
    fn subscribe(&mut self, keys: &[String]) -> Result<()>;
    /// Wait up to `timeout` for the next event.  `Ok(None)` on timeout.
    fn next_event(&mut self, timeout: Duration) -> Result<Option<SourceEvent>>;
    fn unsubscribe(&mut self) -> Result<()>;
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Sources compiled into this build, for `--list-ports`.
pub fn list_ports() -> Vec<String> {
    let mut out = vec![];
    #[cfg(feature = "keyboard")]
    out.push("keyboard  (terminal, needs keyboard enhancement for release events)".into());
    #[cfg(feature = "switch-midi")]
    out.append(&mut midi::list_midi_ports());
    #[cfg(feature = "switch-vband")]
    out.append(&mut vband::list_vband_devices());
    if out.is_empty() {
        out.push("No switch sources compiled into this build.".into());
    }
    out
}

/// Detect the compiled-in hardware sources.  Order: VBand HID → MIDI → keyboard.
pub fn autodetect() -> SourceKind {
    #[cfg(feature = "switch-vband")]
    {
        if vband::is_present() {
            log::info!("[autodetect] VBand HID found");
            return SourceKind::Vband;
        }
    }
    #[cfg(feature = "switch-midi")]
    {
        if midi::has_known_port() {
            log::info!("[autodetect] MIDI switch adapter found");
            return SourceKind::Midi;
        }
    }
    log::info!("[autodetect] no switch adapter found, using the keyboard");
    SourceKind::Keyboard
}

/// Factory.  Sources missing from this build fall back to the keyboard with a
/// warning, or fail when the keyboard is missing too.
pub fn create_source(kind: SourceKind, midi_port: &str) -> Result<Box<dyn SwitchSource>> {
    let kind = if kind == SourceKind::Auto {
        let detected = autodetect();
        log::info!("[autodetect] selected source: {detected:?}");
        detected
    } else {
        kind
    };

    match kind {
        SourceKind::Midi => {
            #[cfg(feature = "switch-midi")]
            {
                return Ok(Box::new(midi::MidiSource::open(midi_port)?));
            }
            #[cfg(not(feature = "switch-midi"))]
            {
                let _ = midi_port;
                log::warn!("source = \"midi\" but this build has no MIDI support, falling back to the keyboard");
            }
        }
        SourceKind::Vband => {
            #[cfg(feature = "switch-vband")]
            {
                return Ok(Box::new(vband::VBandSource::open()?));
            }
            #[cfg(not(feature = "switch-vband"))]
            log::warn!("source = \"vband\" but this build has no VBand support, falling back to the keyboard");
        }
        SourceKind::Keyboard | SourceKind::Auto => {}
    }
    keyboard_source()
}

/// Interactive switch check: ask for each bound switch in turn and wait up
/// to `timeout` for its press.  Returns true when every switch answered.
pub fn check_switches(
    source:   &mut dyn SwitchSource,
    bindings: &KeyBindings,
    timeout:  Duration,
) -> Result<bool> {
    source.subscribe(&bindings.keys())?;
    println!("Source  : {}", source.name());
    println!();

    let total = bindings.iter().count();
    let mut all_ok = true;
    for (n, (role, key)) in bindings.iter().enumerate() {
        println!("[ {}/{total} ]  Press the {role} switch ({key}) now …", n + 1);
        let deadline = Instant::now() + timeout;
        let mut ok = false;
        while let Some(left) = deadline.checked_duration_since(Instant::now()) {
            match source.next_event(left.min(Duration::from_millis(50)))? {
                Some(SourceEvent::Key { key: got, pressed: true, .. }) => match bindings.role_of(&got) {
                    Some(r) if r == role => {
                        println!("         ✓ {role} received");
                        ok = true;
                        break;
                    }
                    Some(other) => println!("         ✗ Got the {other} switch instead"),
                    None        => {}
                },
                Some(SourceEvent::Quit) => {
                    source.unsubscribe()?;
                    return Ok(false);
                }
                _ => {}
            }
        }
        if !ok {
            println!("         ✗ {role} timeout, no press received");
            all_ok = false;
        }
    }
    if let Err(e) = source.unsubscribe() {
        log::warn!("[check] unsubscribe failed: {e:#}");
    }
    Ok(all_ok)
}

#[cfg(feature = "keyboard")]
fn keyboard_source() -> Result<Box<dyn SwitchSource>> {
    Ok(Box::new(keyboard::KeyboardSource::new()))
}

#[cfg(not(feature = "keyboard"))]
fn keyboard_source() -> Result<Box<dyn SwitchSource>> {
    anyhow::bail!("no switch source available: build with the `keyboard`, `switch-midi` or `switch-vband` feature")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names_fold_aliases() {
        assert_eq!(normalize_key_name("right ctrl"), "RCTRL");
        assert_eq!(normalize_key_name("Return"), "ENTER");
        assert_eq!(normalize_key_name(" "), "SPACE");
        assert_eq!(normalize_key_name("vband_dit"), "VBAND_DIT");
        assert_eq!(normalize_key_name("note60"), "NOTE60");
    }

    #[test]
    fn bindings_only_cover_roles_of_the_mode() {
        let b = KeyBindings::for_mode(InputMode::TwoKey, ["space", "enter", "space"]).unwrap();
        assert_eq!(b.keys(), vec!["SPACE".to_string(), "ENTER".to_string()]);
        assert_eq!(b.role_of("Return"), Some(KeyRole::Secondary));
        assert_eq!(b.key_for(KeyRole::Tertiary), None);
    }

    #[test]
    fn duplicate_bindings_are_rejected() {
        let err = KeyBindings::for_mode(InputMode::ThreeKey, ["SPACE", "ENTER", "return"]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateBinding {
                first:  KeyRole::Secondary,
                second: KeyRole::Tertiary,
                key:    "ENTER".into(),
            }
        );
    }

    #[test]
    fn empty_binding_for_used_role_is_rejected() {
        let err = KeyBindings::for_mode(InputMode::TwoKey, ["SPACE", "  ", "RCTRL"]).unwrap_err();
        assert_eq!(err, ConfigError::MissingBinding(KeyRole::Secondary));
    }

    #[test]
    fn switch_check_waits_for_each_role() {
        let (tx, mut src) = ChannelSource::new();
        let b = KeyBindings::for_mode(InputMode::TwoKey, ["SPACE", "ENTER", ""]).unwrap();
        let now = Instant::now();
        for (key, pressed) in [("ENTER", true), ("SPACE", true), ("SPACE", false), ("ENTER", true)] {
            tx.send(SourceEvent::Key { key: key.into(), pressed, at: now }).unwrap();
        }
        assert!(check_switches(&mut src, &b, Duration::from_millis(200)).unwrap());
    }

    #[test]
    fn switch_check_reports_missing_role() {
        let (tx, mut src) = ChannelSource::new();
        let b = KeyBindings::for_mode(InputMode::TwoKey, ["SPACE", "ENTER", ""]).unwrap();
        tx.send(SourceEvent::Key { key: "SPACE".into(), pressed: true, at: Instant::now() }).unwrap();
        assert!(!check_switches(&mut src, &b, Duration::from_millis(100)).unwrap());
        drop(tx);
    }

    #[test]
    fn one_key_mode_binds_primary_only() {
        let b = KeyBindings::for_mode(InputMode::OneKey, ["SPACE", "SPACE", ""]).unwrap();
        assert_eq!(b.iter().count(), 1);
    }
}
