//! Hardware ports: the relay controller and the panel bus.

use roomctl_domain::id::PanelId;

/// Relay controller driving lamps, relays and dry-contact outputs.
pub trait RelayBus: Send + Sync {
    /// Command relay `channel` on or off.
    fn set_relay(&self, channel: u8, on: bool);

    /// Last-known physical state of relay `channel`.
    ///
    /// Must stay consistent while another worker is mid-update.
    fn relay_state(&self, channel: u8) -> bool;
}

/// Key panels on the bus.
pub trait PanelBus: Send + Sync {
    /// Write the full backlight mask of `panel`.
    fn write_backlight(&self, panel: PanelId, backlight: u8);
}
