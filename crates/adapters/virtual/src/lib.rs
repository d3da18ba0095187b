//! # roomctl-adapter-virtual
//!
//! Virtual hardware for demos and tests: every port the engine drives,
//! backed by memory.
//!
//! | Type | Port | Behaviour |
//! |------|------|-----------|
//! | [`VirtualRelayBoard`] | `RelayBus` | Switches instantly, logs every command |
//! | [`VirtualPanelBus`] | `PanelBus` | Keeps the last backlight mask per panel |
//! | [`FixedClock`] | `Clock` | Reports a pinned hour, or none |
//!
//! [`demo_layout`] describes a small room wired to these.
//!
//! ## Dependency rule
//!
//! Depends on `roomctl-app` (port traits) and `roomctl-domain` only.

mod clock;
mod demo;
mod panel_bus;
mod relay_board;

pub use clock::FixedClock;
pub use demo::{DEMO_PANEL, DOOR_CHANNEL, DOORBELL_CHANNEL, HALL_SENSOR_CHANNEL, demo_layout};
pub use panel_bus::VirtualPanelBus;
pub use relay_board::{RelayCommand, VirtualRelayBoard};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use roomctl_app::engine::{EngineSettings, Orchestrator};
    use roomctl_app::event_bus::InProcessEventBus;
    use roomctl_app::ports::Ports;
    use roomctl_domain::id::PanelId;

    use super::*;

    fn engine() -> (Orchestrator, Arc<VirtualRelayBoard>, Arc<VirtualPanelBus>) {
        let relays = Arc::new(VirtualRelayBoard::default());
        let panels = Arc::new(VirtualPanelBus::default());
        let ports = Ports {
            relays: relays.clone(),
            panels: panels.clone(),
            clock: Arc::new(FixedClock::at(12)),
            events: Arc::new(InProcessEventBus::new(64)),
        };
        let engine = Orchestrator::new(demo_layout().unwrap(), ports, EngineSettings::default()).unwrap();
        (engine, relays, panels)
    }

    #[tokio::test(start_paused = true)]
    async fn should_welcome_guest_when_hall_sensor_fires() {
        let (engine, relays, panels) = engine();

        engine.on_channel_infrared(HALL_SENSOR_CHANNEL, true);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(engine.context().is_occupied());
        assert!(relays.is_on(1));
        // linked bedside lamp follows the ceiling
        assert!(relays.is_on(2));
        assert_eq!(panels.backlight(PanelId::new(DEMO_PANEL)), Some(0b0000_0001));
    }

    #[tokio::test(start_paused = true)]
    async fn should_close_curtain_when_opening_other_way() {
        let (engine, relays, _) = engine();
        engine.context().set_occupied(true);

        // key 2 twice: open, then close
        engine.on_panel_report(PanelId::new(DEMO_PANEL), 0xFB, 0);
        engine.on_panel_report(PanelId::new(DEMO_PANEL), 0xFF, 0);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(relays.is_on(4));

        engine.on_panel_report(PanelId::new(DEMO_PANEL), 0xFB, 0);
        engine.on_panel_report(PanelId::new(DEMO_PANEL), 0xFF, 0);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(relays.is_on(5));
        assert!(!relays.is_on(4));
    }
}
