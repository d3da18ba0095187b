//! Orchestration engine.
//!
//! [`Orchestrator`] is the single entry point the wire layer talks to: it
//! ingests channel and panel reports, runs and cancels scenes, and owns the
//! shared [`RoomContext`], the [`Registry`] and the indicator coalescer. It
//! is cheap to clone; every clone shares the same state.
//!
//! The behaviour is split across submodules:
//!
//! | Module | Concern |
//! |--------|---------|
//! | [`scene_engine`] | run / cancel / pause, at most one run per scene |
//! | [`propagation`] | `execute` with link and repel propagation |
//! | [`devices`] | direct effect of each device kind |
//! | [`channel`] | channel routing and the presence debouncer |
//! | [`panel`] | panel edge detection and key dispatch |

pub mod channel;
pub mod devices;
pub mod panel;
pub mod propagation;
pub mod scene_engine;

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use roomctl_domain::device::Device;
use roomctl_domain::error::RoomError;
use roomctl_domain::event::{Event, EventKind};
use roomctl_domain::id::{PanelId, SceneId};
use roomctl_domain::layout::RoomLayout;
use roomctl_domain::presence::NightWindow;
use roomctl_domain::room_state::RoomStates;

use crate::coalescer::IndicatorCoalescer;
use crate::context::RoomContext;
use crate::ports::Ports;
use crate::registry::Registry;

pub use propagation::Flow;
pub use scene_engine::SceneRun;

/// Tunables of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Hours during which debounce durations are doubled.
    pub night: NightWindow,
    /// How long an indicator `flash` stays lit.
    pub flash: Duration,
    /// A scene younger than this blocks the occupancy timeout.
    pub recent_activity: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            night: NightWindow::default(),
            flash: Duration::from_secs(1),
            recent_activity: Duration::from_secs(10),
        }
    }
}

/// Point-in-time view of the room, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomStatus {
    pub mode: String,
    pub occupied: bool,
    pub sleeping: bool,
    pub door_open: bool,
    pub any_key: Option<SceneId>,
    pub room_states: RoomStates,
    pub running: Vec<SceneId>,
}

struct Inner {
    registry: RwLock<Arc<Registry>>,
    context: RoomContext,
    coalescer: IndicatorCoalescer<PanelId>,
    ports: Ports,
    settings: EngineSettings,
}

/// The room orchestration engine.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Build the engine for `layout`.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::Validation`] if the layout is inconsistent.
    pub fn new(layout: RoomLayout, ports: Ports, settings: EngineSettings) -> Result<Self, RoomError> {
        let registry = Registry::build(layout)?;
        let context = RoomContext::new(registry.occupied_at_start());
        Ok(Self {
            inner: Arc::new(Inner {
                registry: RwLock::new(Arc::new(registry)),
                context,
                coalescer: IndicatorCoalescer::new(),
                ports,
                settings,
            }),
        })
    }

    /// Replace the whole configuration.
    ///
    /// Running scenes are cancelled, debounce timers disarmed and the
    /// context is reset. Scenes already running finish their current step
    /// against the previous registry.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::Validation`] if `layout` is inconsistent; the
    /// current configuration stays in place.
    #[tracing::instrument(skip_all)]
    pub fn reconfigure(&self, layout: RoomLayout) -> Result<(), RoomError> {
        let next = Arc::new(Registry::build(layout)?);
        let previous = {
            let mut current = self
                .inner
                .registry
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, Arc::clone(&next))
        };
        previous.shutdown();
        self.inner.coalescer.flush_all();
        self.inner.context.reset(next.occupied_at_start());
        tracing::info!("room reconfigured");
        Ok(())
    }

    /// The registry currently in effect.
    #[must_use]
    pub fn registry(&self) -> Arc<Registry> {
        let current = self
            .inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&current)
    }

    #[must_use]
    pub fn context(&self) -> &RoomContext {
        &self.inner.context
    }

    #[must_use]
    pub fn settings(&self) -> EngineSettings {
        self.inner.settings
    }

    #[must_use]
    pub fn status(&self) -> RoomStatus {
        let ctx = &self.inner.context;
        let mut running: Vec<SceneId> = self
            .registry()
            .scenes()
            .filter(|slot| slot.is_running())
            .map(|slot| slot.scene.id)
            .collect();
        running.sort_unstable();
        RoomStatus {
            mode: ctx.mode(),
            occupied: ctx.is_occupied(),
            sleeping: ctx.is_sleeping(),
            door_open: ctx.is_door_open(),
            any_key: ctx.any_key(),
            room_states: ctx.room_states(),
            running,
        }
    }

    /// Publish every queued indicator write now.
    pub fn flush_indicators(&self) -> usize {
        self.inner.coalescer.flush_all()
    }

    fn publish(&self, kind: EventKind) {
        self.inner.ports.events.publish(Event::new(kind));
    }

    /// Queue one backlight write for `panel`, reading its mask at flush time.
    fn request_panel_publish(&self, registry: &Arc<Registry>, panel: PanelId) {
        let registry = Arc::clone(registry);
        let bus = Arc::clone(&self.inner.ports.panels);
        self.inner.coalescer.request(panel, move || {
            if let Some(slot) = registry.panel(panel) {
                bus.write_backlight(panel, slot.backlight());
            }
        });
    }

    /// Mirror `on` onto every indicator of `device`.
    fn sync_indicators(&self, registry: &Arc<Registry>, device: &Device, on: bool) {
        for indicator in &device.indicators {
            let Some(panel) = registry.panel(indicator.panel) else {
                tracing::warn!(device = %device.id, panel = %indicator.panel, "indicator on unknown panel");
                continue;
            };
            panel.with_state(|state| state.set_backlight(indicator.button, on));
            self.request_panel_publish(registry, indicator.panel);
        }
    }

    /// Leave sleep when the room is occupied: restore every switch's
    /// indicators and publish them.
    fn wake_if_sleeping(&self, registry: &Arc<Registry>) {
        let ctx = &self.inner.context;
        if !ctx.is_occupied() || !ctx.wake() {
            return;
        }
        tracing::info!("waking up");
        for device in registry.devices() {
            if let Some(channel) = device.kind.relay_channel() {
                let on = self.inner.ports.relays.relay_state(channel);
                self.sync_indicators(registry, device, on);
            }
        }
        self.inner.coalescer.flush_all();
    }
}
