//! Panel report ingestion and per-key dispatch.

use std::sync::Arc;

use roomctl_domain::id::PanelId;
use roomctl_domain::input::InputTag;
use roomctl_domain::panel::buttons_in;

use super::Orchestrator;
use crate::registry::{ButtonSlot, Registry};

impl Orchestrator {
    /// A panel reported its pressed keys (active low) and backlight.
    ///
    /// Fires the dispatch of every key that was just pressed; repeated
    /// reports of a held key and releases fire nothing.
    #[tracing::instrument(skip(self))]
    pub fn on_panel_report(&self, panel: PanelId, pressed_mask: u8, backlight: u8) {
        let registry = self.registry();
        let Some(slot) = registry.panel(panel) else {
            tracing::warn!(%panel, "report from unknown panel");
            return;
        };
        let edges = slot.with_state(|state| state.apply_report(pressed_mask, backlight));

        for button in buttons_in(edges) {
            match slot.button(button) {
                Some(key) => self.dispatch_button(&registry, key),
                None => tracing::debug!(%panel, button, "unconfigured key pressed"),
            }
        }
    }

    fn dispatch_button(&self, registry: &Arc<Registry>, key: &ButtonSlot) {
        let ctx = self.context();
        self.wake_if_sleeping(registry);

        if let Some(scene) = ctx.take_any_key() {
            tracing::debug!(input = %key.spec.id, %scene, "any-key override consumed");
            self.run_scene(scene);
            return;
        }

        if !ctx.is_occupied() && !key.spec.has_tag(InputTag::RemoveCardUsable) {
            tracing::info!(input = %key.spec.id, "room unoccupied, key ignored");
            return;
        }

        if ctx.swap_last_button(key.spec.id) != Some(key.spec.id) {
            key.cycle.reset();
        }
        if let Some(scene) = key.cycle.advance() {
            tracing::debug!(input = %key.spec.id, %scene, "key pressed");
            self.run_scene(scene);
        }
    }
}
