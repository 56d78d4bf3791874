// src/keyer/midi.rs  -  MIDI switch adapter (Digispark / ATtiny85 style firmware)
//
// Any NoteOn/NoteOff on the opened port becomes a key event named
// `NOTE<n>`, so switches are bound as e.g. key_one = "NOTE60".
// NoteOn with velocity 0 counts as a release.
//
// ALSA permissions: the current user must be in the `audio` group, or
// PipeWire/JACK must expose the device.

use super::{normalize_key_name, SourceEvent, SwitchSource};
use anyhow::{anyhow, Result};
use midir::{MidiInput, MidiInputConnection};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Known switch-adapter MIDI port name fragments (case-insensitive)
pub const KNOWN_NAMES: &[&str] = &[
    "digispark", "attiny", "tiny", "digikey",
    "midistomp", "usb midi", "midi keyer", "switch",
];

pub struct MidiSource {
    rx:         Receiver<SourceEvent>,
    subscribed: Arc<Mutex<Vec<String>>>,
    port_name:  String,
    _conn:      MidiInputConnection<()>,
}

impl MidiSource {
    /// Open the MIDI port.  `port_hint` is either "" (auto-detect) or a
    /// substring to match against available port names.
    pub fn open(port_hint: &str) -> Result<Self> {
        let midi_in = MidiInput::new("morse-switch")
            .map_err(|e| anyhow!("MIDI init failed: {e}"))?;

        let ports = midi_in.ports();
        if ports.is_empty() {
            return Err(anyhow!("No MIDI input ports found.\n  Is the switch adapter plugged in?"));
        }

        let hint_lc = port_hint.to_lowercase();
        let port = ports
            .iter()
            .find(|p| {
                let name = midi_in.port_name(p).unwrap_or_default().to_lowercase();
                if hint_lc.is_empty() {
                    KNOWN_NAMES.iter().any(|n| name.contains(n))
                } else {
                    name.contains(&hint_lc)
                }
            })
            .ok_or_else(|| {
                let avail: Vec<_> = ports.iter().map(|p| midi_in.port_name(p).unwrap_or_default()).collect();
                anyhow!(
                    "MIDI switch adapter not found.\n  \
                     Available MIDI ports: {avail:?}\n  \
                     → Plug in the device, or set midi_port = \"<name>\" in [input]."
                )
            })?
            .clone();

        let port_name = midi_in.port_name(&port).unwrap_or_else(|_| "?".into());
        log::info!("[midi] Opening MIDI port: {port_name}");

        let (tx, rx): (Sender<SourceEvent>, _) = mpsc::channel();
        let subscribed = Arc::new(Mutex::new(Vec::<String>::new()));
        let subscribed_cb = Arc::clone(&subscribed);

        let conn = midi_in
            .connect(
                &port,
                "morse-switch-input",
                move |_stamp, msg, _| {
                    let Some((key, pressed)) = decode_note(msg) else { return };
                    let wanted = subscribed_cb
                        .lock()
                        .map(|keys| keys.contains(&key))
                        .unwrap_or(false);
                    if wanted {
                        log::debug!("[midi] {key} {}", if pressed { "press" } else { "release" });
                        let _ = tx.send(SourceEvent::Key { key, pressed, at: Instant::now() });
                    }
                },
                (),
            )
            .map_err(|e| anyhow!("MIDI connect failed: {e}"))?;

        Ok(Self { rx, subscribed, port_name, _conn: conn })
    }

    fn set_subscription(&self, keys: Vec<String>) -> Result<()> {
        let mut guard = self.subscribed.lock().map_err(|_| anyhow!("MIDI subscription lock poisoned"))?;
        *guard = keys;
        Ok(())
    }
}

/// `[status, note, velocity]` → (`NOTE<n>`, pressed)
fn decode_note(msg: &[u8]) -> Option<(String, bool)> {
    if msg.len() < 3 {
        return None;
    }
    let status   = msg[0] & 0xF0;
    let note     = msg[1];
    let velocity = msg[2];
    let pressed = match status {
        0x90 => velocity > 0,
        0x80 => false,
        _    => return None,
    };
    Some((format!("NOTE{note}"), pressed))
}

impl SwitchSource for MidiSource {
    fn name(&self) -> &str { &self.port_name }

    fn subscribe(&mut self, keys: &[String]) -> Result<()> {
        self.set_subscription(keys.iter().map(|k| normalize_key_name(k)).collect())
    }

    fn next_event(&mut self, timeout: Duration) -> Result<Option<SourceEvent>> {
        match self.rx.recv_timeout(timeout) {
            Ok(ev)                              => Ok(Some(ev)),
            Err(RecvTimeoutError::Timeout)      => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(anyhow!("MIDI connection closed")),
        }
    }

    fn unsubscribe(&mut self) -> Result<()> {
        self.set_subscription(vec![])
    }
}

/// True when a port with a known adapter name is present.
pub fn has_known_port() -> bool {
    let Ok(mi) = MidiInput::new("morse-switch-detect") else { return false };
    let found = mi.ports().iter().any(|p| {
        let name = mi.port_name(p).unwrap_or_default().to_lowercase();
        KNOWN_NAMES.iter().any(|n| name.contains(n))
    });
    found
}

/// List available MIDI input ports (for --list-ports output)
pub fn list_midi_ports() -> Vec<String> {
    let Ok(midi_in) = MidiInput::new("morse-switch-list") else { return vec![] };
    midi_in
        .ports()
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let name = midi_in.port_name(p).unwrap_or_else(|_| format!("port-{i}"));
            format!("MIDI [{i}] {name}")
        })
        .collect()
}
