//! Virtual panel bus: keeps the last backlight mask written to each panel.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use roomctl_app::ports::PanelBus;
use roomctl_domain::id::PanelId;

#[derive(Debug, Default)]
pub struct VirtualPanelBus {
    backlights: Mutex<BTreeMap<PanelId, u8>>,
    writes: Mutex<usize>,
}

impl VirtualPanelBus {
    /// Last mask written to `panel`, `None` if it was never written.
    #[must_use]
    pub fn backlight(&self, panel: PanelId) -> Option<u8> {
        self.backlights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&panel)
            .copied()
    }

    /// Number of writes received, across all panels.
    #[must_use]
    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PanelBus for VirtualPanelBus {
    fn write_backlight(&self, panel: PanelId, backlight: u8) {
        tracing::debug!(%panel, backlight = format_args!("{backlight:#010b}"), "virtual backlight written");
        self.backlights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(panel, backlight);
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_keep_last_mask_per_panel() {
        let bus = VirtualPanelBus::default();
        bus.write_backlight(PanelId::new(1), 0b0000_0001);
        bus.write_backlight(PanelId::new(1), 0b0000_0011);
        bus.write_backlight(PanelId::new(2), 0b1000_0000);

        assert_eq!(bus.backlight(PanelId::new(1)), Some(0b0000_0011));
        assert_eq!(bus.backlight(PanelId::new(2)), Some(0b1000_0000));
        assert_eq!(bus.backlight(PanelId::new(3)), None);
        assert_eq!(bus.writes(), 3);
    }
}
