//! Panel key edge detection.
//!
//! Panels report an active-low bitmask of pressed keys (a clear bit means
//! pressed) whenever anything changes, and may repeat the same report while
//! a key is held. [`PanelState`] remembers which keys are held so that each
//! physical press fires exactly once.

use serde::{Deserialize, Serialize};

/// Number of keys (and backlight bits) on a panel.
pub const BUTTONS_PER_PANEL: u8 = 8;

/// Report mask meaning "nothing pressed".
pub const ALL_RELEASED: u8 = 0xFF;

/// Backlight and held-key memory of one panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelState {
    pub backlight: u8,
    pub held: u8,
}

impl PanelState {
    /// Apply a panel report and return the mask of keys that were just
    /// pressed (press edges), one bit per key.
    ///
    /// An all-released report only clears the held memory; the backlight
    /// snapshot that comes with it is ignored.
    pub fn apply_report(&mut self, pressed_mask: u8, backlight: u8) -> u8 {
        if pressed_mask == ALL_RELEASED {
            self.held = 0;
            return 0;
        }
        self.backlight = backlight;

        let pressed = !pressed_mask;
        let edges = pressed & !self.held;
        // keep held bits only for keys still pressed, add the new ones
        self.held = pressed;
        edges
    }

    /// Set or clear one backlight bit.
    pub fn set_backlight(&mut self, button: u8, on: bool) {
        if button >= BUTTONS_PER_PANEL {
            return;
        }
        let bit = 1u8 << button;
        if on {
            self.backlight |= bit;
        } else {
            self.backlight &= !bit;
        }
    }

    #[cfg(test)]
    fn backlight_on(&self, button: u8) -> bool {
        button < BUTTONS_PER_PANEL && self.backlight & (1 << button) != 0
    }
}

/// Iterate the key indices set in `mask`, lowest first.
pub fn buttons_in(mask: u8) -> impl Iterator<Item = u8> {
    (0..BUTTONS_PER_PANEL).filter(move |b| mask & (1 << b) != 0)
}
