// src/keyer/channel.rs  -  Source fed from another thread (OS hooks of an embedder, tests)
use super::{normalize_key_name, SourceEvent, SwitchSource};
use anyhow::{anyhow, Result};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

/// A [`SwitchSource`] whose events are pushed through an mpsc channel.
/// Key events for keys outside the subscription are swallowed.
pub struct ChannelSource {
    rx:         Receiver<SourceEvent>,
    subscribed: Vec<String>,
}

impl ChannelSource {
    pub fn new() -> (Sender<SourceEvent>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self { rx, subscribed: vec![] })
    }
}

impl SwitchSource for ChannelSource {
    fn name(&self) -> &str { "channel" }

    fn subscribe(&mut self, keys: &[String]) -> Result<()> {
        self.subscribed = keys.iter().map(|k| normalize_key_name(k)).collect();
        log::debug!("[channel] subscribed to {:?}", self.subscribed);
        Ok(())
    }

    fn next_event(&mut self, timeout: Duration) -> Result<Option<SourceEvent>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let ev = match self.rx.recv_timeout(remaining) {
                Ok(ev)                              => ev,
                Err(RecvTimeoutError::Timeout)      => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => return Err(anyhow!("event feed closed")),
            };
            if let SourceEvent::Key { key, .. } = &ev {
                if !self.subscribed.contains(&normalize_key_name(key)) {
                    log::debug!("[channel] {key} not subscribed, dropped");
                    continue;
                }
            }
            return Ok(Some(ev));
        }
    }

    fn unsubscribe(&mut self) -> Result<()> {
        self.subscribed.clear();
        Ok(())
    }
}
