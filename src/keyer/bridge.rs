// src/keyer/bridge.rs  -  Source thread → role-tagged switch events for the engine
//
// One thread per bridge.  It owns the SwitchSource, maps physical keys to
// roles, drops repeated edges (a second press while the role is already
// down, a release while it is up) and forwards everything else, in order,
// over an mpsc channel.  The engine never sees the source itself.
//
// rebind() waits until the thread has re-subscribed.  A refused key set
// leaves the previous subscription and bindings in place.
//
// Shutdown: stop() sends Stop on the control channel; the thread drains what
// the source still has buffered, unsubscribes (failure is only logged) and
// exits.  The engine drains its own channel afterwards.

use super::{KeyBindings, SourceEvent, SwitchEvent, SwitchSource};
use anyhow::{anyhow, Context, Result};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long the thread waits on the source before checking for control messages.
const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// Upper bound on events taken from the source while shutting down.
const DRAIN_LIMIT: usize = 256;

/// What the bridge delivers to the engine thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeMsg {
    Switch(SwitchEvent),
    /// The source asked for shutdown or failed.
    Quit,
}

enum Control {
    Rebind(KeyBindings, Sender<Result<()>>),
    Stop,
}

pub struct EventBridge {
    control: Sender<Control>,
    handle:  Option<JoinHandle<()>>,
    name:    String,
}

impl EventBridge {
    /// Subscribe `source` to the bound keys and start the bridge thread.
    /// Subscription errors are returned before any thread is started.
    pub fn spawn(
        mut source: Box<dyn SwitchSource>,
        bindings:   KeyBindings,
        tx:         Sender<BridgeMsg>,
    ) -> Result<Self> {
        let name = source.name().to_string();
        source
            .subscribe(&bindings.keys())
            .with_context(|| format!("subscribing {name} to {:?}", bindings.keys()))?;
        log::info!("[bridge] {name} subscribed to {:?}", bindings.keys());

        let (control, rx_control) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("switch-bridge".into())
            .spawn(move || Relay::new(source, bindings, tx).run(rx_control))
            .context("spawning bridge thread")?;

        Ok(Self { control, handle: Some(handle), name })
    }

    pub fn source_name(&self) -> &str { &self.name }

    /// Re-subscribe for a new mode or new key bindings.  Returns once the
    /// thread has switched over; events read afterwards use the new roles.
    /// On error the old bindings are still in force.
    pub fn rebind(&self, bindings: KeyBindings) -> Result<()> {
        let (ack, done) = mpsc::channel();
        self.control
            .send(Control::Rebind(bindings, ack))
            .map_err(|_| anyhow!("bridge thread has stopped"))?;
        done.recv().map_err(|_| anyhow!("bridge thread has stopped"))?
    }

    /// Stop the thread and wait for it.  Safe to call twice.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else { return };
        let _ = self.control.send(Control::Stop);
        if handle.join().is_err() {
            log::error!("[bridge] bridge thread panicked");
        }
        log::info!("[bridge] {} stopped", self.name);
    }
}

impl Drop for EventBridge {
    fn drop(&mut self) { self.stop(); }
}

// ── Thread side ───────────────────────────────────────────────────────────────

enum Rebind {
    Done,
    /// New keys refused, old subscription restored.
    Kept(anyhow::Error),
    /// Neither key set could be subscribed; the relay gives up.
    Lost(anyhow::Error),
}

struct Relay {
    source:   Box<dyn SwitchSource>,
    bindings: KeyBindings,
    tx:       Sender<BridgeMsg>,
    down:     [bool; 3],
}

impl Relay {
    fn new(source: Box<dyn SwitchSource>, bindings: KeyBindings, tx: Sender<BridgeMsg>) -> Self {
        Self { source, bindings, tx, down: [false; 3] }
    }

    fn run(mut self, control: Receiver<Control>) {
        loop {
            match control.try_recv() {
                Ok(Control::Rebind(b, ack)) => match self.rebind(b) {
                    Rebind::Done    => { let _ = ack.send(Ok(())); }
                    Rebind::Kept(e) => { let _ = ack.send(Err(e)); }
                    Rebind::Lost(e) => {
                        let _ = ack.send(Err(e));
                        let _ = self.tx.send(BridgeMsg::Quit);
                        break;
                    }
                },
                Ok(Control::Stop) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }
            match self.source.next_event(POLL_INTERVAL) {
                Ok(Some(ev)) => {
                    if !self.forward(ev) { break; }
                }
                Ok(None) => {}
                Err(e) => {
                    log::error!("[bridge] {} failed: {e:#}", self.source.name());
                    let _ = self.tx.send(BridgeMsg::Quit);
                    break;
                }
            }
        }
        self.shutdown();
    }

    fn rebind(&mut self, bindings: KeyBindings) -> Rebind {
        if let Err(e) = self.source.unsubscribe() {
            log::warn!("[bridge] unsubscribe before rebind failed: {e:#}");
        }
        let err = match self.source.subscribe(&bindings.keys()) {
            Ok(()) => {
                log::info!("[bridge] re-subscribed to {:?}", bindings.keys());
                self.bindings = bindings;
                self.down = [false; 3];
                return Rebind::Done;
            }
            Err(e) => e.context(format!("subscribing to {:?}", bindings.keys())),
        };
        log::error!("[bridge] {err:#}, keeping {:?}", self.bindings.keys());
        match self.source.subscribe(&self.bindings.keys()) {
            Ok(())  => Rebind::Kept(err),
            Err(e2) => {
                log::error!("[bridge] {} lost its old keys too: {e2:#}", self.source.name());
                Rebind::Lost(err)
            }
        }
    }

    /// `false` once the engine side has gone away.
    fn forward(&mut self, ev: SourceEvent) -> bool {
        let msg = match ev {
            SourceEvent::Quit => BridgeMsg::Quit,
            SourceEvent::Key { key, pressed, at } => {
                let Some(role) = self.bindings.role_of(&key) else {
                    log::debug!("[bridge] {key} is not bound, ignored");
                    return true;
                };
                let down = &mut self.down[role.index()];
                if *down == pressed {
                    log::debug!("[bridge] repeated {} on {role}, dropped", if pressed { "press" } else { "release" });
                    return true;
                }
                *down = pressed;
                BridgeMsg::Switch(SwitchEvent { role, pressed, at })
            }
        };
        self.tx.send(msg).is_ok()
    }

    fn shutdown(&mut self) {
        for _ in 0..DRAIN_LIMIT {
            match self.source.next_event(Duration::ZERO) {
                Ok(Some(ev)) => {
                    if !self.forward(ev) { break; }
                }
                Ok(None) | Err(_) => break,
            }
        }
        if let Err(e) = self.source.unsubscribe() {
            log::warn!("[bridge] unsubscribe from {} failed: {e:#}", self.source.name());
        }
    }
}
