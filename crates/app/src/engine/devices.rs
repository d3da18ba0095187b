//! Direct effect of one operation on one device, by device kind.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::runtime::Handle;

use roomctl_domain::command::{Command, IndicatorMode, SOS_STATE};
use roomctl_domain::device::Device;
use roomctl_domain::event::{EventKind, ReportReason};
use roomctl_domain::id::{DeviceId, PanelId};

use super::Orchestrator;
use super::propagation::Flow;
use super::scene_engine::SceneRun;
use crate::registry::Registry;

/// Result of [`Orchestrator::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Effect {
    pub flow: Flow,
    /// New state of a switch, `None` for helper devices.
    pub switched: Option<bool>,
}

impl Effect {
    const NONE: Self = Self {
        flow: Flow::Continue,
        switched: None,
    };

    fn flow(flow: Flow) -> Self {
        Self {
            flow,
            switched: None,
        }
    }

    fn switched(on: bool) -> Self {
        Self {
            flow: Flow::Continue,
            switched: Some(on),
        }
    }
}

impl Orchestrator {
    pub(crate) fn apply(
        &self,
        registry: &Arc<Registry>,
        device: &Device,
        operation: &str,
        parameter: &str,
        run: Option<&SceneRun>,
    ) -> Effect {
        let command = match Command::parse(&device.kind, operation, parameter) {
            Ok(command) => command,
            Err(error) => {
                tracing::warn!(device = %device.id, %error, "operation ignored");
                return Effect::NONE;
            }
        };
        let ctx = &self.inner.context;

        match command {
            Command::Switch(switching) => {
                let Some(channel) = device.kind.relay_channel() else {
                    return Effect::NONE;
                };
                let relays = &self.inner.ports.relays;
                let target = switching.target(relays.relay_state(channel));
                relays.set_relay(channel, target);
                self.sync_indicators(registry, device, target);
                return Effect::switched(target);
            }
            Command::Sleep => {
                for panel in registry.panels() {
                    panel.with_state(|state| state.backlight = 0);
                    self.request_panel_publish(registry, panel.id);
                }
                ctx.set_sleeping(true);
                tracing::info!("room asleep");
            }
            Command::CardIn => {
                ctx.set_occupied(true);
                ctx.set_sleeping(false);
                tracing::info!("card inserted");
            }
            Command::CardOut => {
                ctx.set_occupied(false);
                ctx.set_sleeping(true);
                tracing::info!("card removed");
            }
            Command::AddState(tag) => {
                ctx.with_room_states(|states| states.add(&tag));
                if tag == SOS_STATE {
                    self.publish(EventKind::StateReport {
                        reason: ReportReason::Sos,
                    });
                }
            }
            Command::RemoveState(tag) => {
                ctx.with_room_states(|states| states.remove(&tag));
            }
            Command::ToggleState(tag) => {
                ctx.with_room_states(|states| states.toggle(&tag));
            }
            Command::ExitIfState(tag) => {
                if ctx.has_state(&tag) {
                    if run.is_some() {
                        tracing::debug!(%tag, "room state present, leaving scene");
                        return Effect::flow(Flow::Abort);
                    }
                    tracing::error!(%tag, "exit_if_present used outside a scene");
                }
            }
            Command::Delay(duration) => {
                if run.is_some() {
                    return Effect::flow(Flow::Pause(duration));
                }
                tracing::debug!(?duration, "delay outside a scene ignored");
            }
            Command::InvokeScene(scene) => {
                self.run_scene(scene);
            }
            Command::CancelScene(scene) => self.cancel_scene(scene),
            Command::ArmAnyKey(scene) => ctx.arm_any_key(scene),
            Command::ClearAnyKey => ctx.clear_any_key(),
            Command::RecordSnapshot => {
                let relays = &self.inner.ports.relays;
                let states: BTreeMap<DeviceId, bool> = registry
                    .devices()
                    .filter_map(|d| {
                        d.kind
                            .relay_channel()
                            .map(|channel| (d.id, relays.relay_state(channel)))
                    })
                    .collect();
                tracing::debug!(switches = states.len(), "snapshot recorded");
                ctx.record_snapshot(states);
            }
            Command::RestoreSnapshot => {
                for (id, on) in ctx.take_snapshot() {
                    self.execute(id, if on { "on" } else { "off" }, "", None, false);
                }
            }
            Command::DiscardSnapshot => ctx.discard_snapshot(),
            Command::DiscardSnapshotAndExit => {
                ctx.discard_snapshot();
                if run.is_some() {
                    return Effect::flow(Flow::Abort);
                }
            }
            Command::Indicator {
                panel,
                button,
                mode,
            } => match mode {
                IndicatorMode::On | IndicatorMode::Off => {
                    let Some(slot) = registry.panel(panel) else {
                        tracing::warn!(%panel, "indicator on unknown panel");
                        return Effect::NONE;
                    };
                    slot.with_state(|state| state.set_backlight(button, mode == IndicatorMode::On));
                    self.request_panel_publish(registry, panel);
                }
                IndicatorMode::Flash => self.flash_indicator(registry, panel, button),
            },
        }
        Effect::NONE
    }

    /// Light `button` right away and darken it after the flash time.
    ///
    /// Both writes bypass the coalescer.
    fn flash_indicator(&self, registry: &Arc<Registry>, panel: PanelId, button: u8) {
        let Some(slot) = registry.panel(panel) else {
            tracing::warn!(%panel, "indicator on unknown panel");
            return;
        };
        let lit = slot.with_state(|state| {
            state.set_backlight(button, true);
            state.backlight
        });
        self.inner.ports.panels.write_backlight(panel, lit);

        let Ok(runtime) = Handle::try_current() else {
            tracing::error!(%panel, button, "no runtime, flash will stay lit");
            return;
        };
        let registry = Arc::clone(registry);
        let bus = Arc::clone(&self.inner.ports.panels);
        let flash = self.inner.settings.flash;
        runtime.spawn(async move {
            tokio::time::sleep(flash).await;
            if let Some(slot) = registry.panel(panel) {
                let dark = slot.with_state(|state| {
                    state.set_backlight(button, false);
                    state.backlight
                });
                bus.write_backlight(panel, dark);
            }
        });
    }
}
