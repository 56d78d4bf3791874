// src/keyer/vband.rs  -  VBand USB paddle as a two-switch source  (VID 0x413d / PID 0x2107)
//
// The VBand dongle is a USB HID device, on Linux it appears as /dev/hidraw*.
// Byte 0 of each report is the paddle bitmask: 0x01 = left paddle,
// 0x10 = right paddle.  The paddles are reported as keys VBAND_DIT and
// VBAND_DAH; any role can be bound to either.
//
// Linux permissions: /dev/hidraw* is root-only by default.  Create a udev rule once:
//
//   echo 'SUBSYSTEM=="hidraw", ATTRS{idVendor}=="413d", \
//         ATTRS{idProduct}=="2107", GROUP="plugdev", MODE="0660"' \
//     | sudo tee /etc/udev/rules.d/99-vband-cw.rules
//   sudo udevadm control --reload-rules && sudo udevadm trigger

use super::{normalize_key_name, SourceEvent, SwitchSource};
use anyhow::{anyhow, Context, Result};
use hidapi::{HidApi, HidDevice};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub const VBAND_VID: u16 = 0x413d;
pub const VBAND_PID: u16 = 0x2107;

pub const DIT_MASK: u8 = 0x01;
pub const DAH_MASK: u8 = 0x10;

pub const DIT_KEY: &str = "VBAND_DIT";
pub const DAH_KEY: &str = "VBAND_DAH";

pub struct VBandSource {
    dev:        HidDevice,
    mask:       u8,
    subscribed: Vec<String>,
    pending:    VecDeque<SourceEvent>,
}

impl VBandSource {
    pub fn open() -> Result<Self> {
        let api = HidApi::new().context("HID init failed")?;
        let dev = api.open(VBAND_VID, VBAND_PID).map_err(|e| {
            anyhow!(
                "VBand adapter not accessible: {e}\n  \
                 Is it plugged in?  On Linux check /dev/hidraw* permissions."
            )
        })?;
        log::info!("[vband] opened VBand HID {VBAND_VID:04x}:{VBAND_PID:04x}");
        Ok(Self { dev, mask: 0, subscribed: vec![], pending: VecDeque::new() })
    }

    fn queue_changes(&mut self, mask: u8, at: Instant) {
        for (bit, key) in [(DIT_MASK, DIT_KEY), (DAH_MASK, DAH_KEY)] {
            let was = self.mask & bit != 0;
            let now = mask & bit != 0;
            if was != now && self.subscribed.iter().any(|k| k == key) {
                self.pending.push_back(SourceEvent::Key { key: key.into(), pressed: now, at });
            }
        }
        self.mask = mask;
    }
}

/// Paddle bitmask of one report.  hidapi on Windows prepends a report-ID
/// byte, so the mask is the first non-zero byte of the first two.
fn report_mask(buf: &[u8], n: usize) -> u8 {
    if n == 0 {
        0
    } else if buf[0] != 0 {
        buf[0]
    } else if n >= 2 {
        buf[1]
    } else {
        0
    }
}

impl SwitchSource for VBandSource {
    fn name(&self) -> &str { "VBand USB HID" }

    fn subscribe(&mut self, keys: &[String]) -> Result<()> {
        self.subscribed = keys.iter().map(|k| normalize_key_name(k)).collect();
        Ok(())
    }

    fn next_event(&mut self, timeout: Duration) -> Result<Option<SourceEvent>> {
        if let Some(ev) = self.pending.pop_front() {
            return Ok(Some(ev));
        }
        let mut buf = [0u8; 9];
        let ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        let n = self.dev.read_timeout(&mut buf, ms).context("VBand HID read failed")?;
        if n > 0 {
            let mask = report_mask(&buf, n);
            log::debug!("[vband] report n={n} mask=0x{mask:02X}");
            self.queue_changes(mask, Instant::now());
        }
        Ok(self.pending.pop_front())
    }

    fn unsubscribe(&mut self) -> Result<()> {
        self.subscribed.clear();
        self.pending.clear();
        Ok(())
    }
}

/// True when the VBand adapter can be opened.
pub fn is_present() -> bool {
    HidApi::new()
        .map(|api| api.open(VBAND_VID, VBAND_PID).is_ok())
        .unwrap_or(false)
}

/// List connected VBand adapters (for --list-ports output).
pub fn list_vband_devices() -> Vec<String> {
    let Ok(api) = HidApi::new() else { return vec![] };
    api.device_list()
        .filter(|d| d.vendor_id() == VBAND_VID && d.product_id() == VBAND_PID)
        .map(|d| format!(
            "VBand HID {:04x}:{:04x}  {}  (keys {DIT_KEY} / {DAH_KEY})",
            d.vendor_id(), d.product_id(), d.path().to_string_lossy()
        ))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_skips_windows_report_id() {
        assert_eq!(report_mask(&[0x01, 0, 0], 3), 0x01);
        assert_eq!(report_mask(&[0x00, 0x10, 0], 3), 0x10);
        assert_eq!(report_mask(&[0x00], 1), 0);
        assert_eq!(report_mask(&[0x11], 0), 0);
    }
}
